//! Fetch-decode-execute loop (spec §4.5): one Thread owns a Runtime Stack
//! and executes one function, following `CALL_SIG`/`IMPL` transitively,
//! until a `RETURN` at call-stack root or a fault.
//!
//! A `match` over the already-decoded [`Opcode`]/[`Operand`] pair, since
//! `cryo_core::objfile::read` has already decoded each instruction once at
//! load time — there is no raw-word re-decoding per fetch.

use cryo_core::ir::{Instruction, Operand};
use cryo_core::opcode::Opcode;
use cryo_core::signature;
use cryo_core::types::TypeTable;

use crate::fault::Fault;
use crate::intrinsics::IntrinsicRegistry;
use crate::loader::Executable;
use crate::stack::{RuntimeStack, DEFAULT_CAPACITY};

/// Spec §4.5: "Idle → Running → (Halted | Faulted)". `execute()` is not
/// re-entrant on a given Thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Idle,
    Running,
    Halted,
    Faulted,
}

pub struct Thread<'e> {
    executable: &'e Executable,
    intrinsics: &'e IntrinsicRegistry,
    type_table: &'e TypeTable,
    stack: RuntimeStack,
    current_function: usize,
    pc: usize,
    state: ThreadState,
}

impl<'e> Thread<'e> {
    pub fn new(executable: &'e Executable, intrinsics: &'e IntrinsicRegistry, type_table: &'e TypeTable) -> Self {
        Self::with_stack_capacity(executable, intrinsics, type_table, DEFAULT_CAPACITY)
    }

    pub fn with_stack_capacity(executable: &'e Executable, intrinsics: &'e IntrinsicRegistry, type_table: &'e TypeTable, capacity: usize) -> Self {
        Self {
            executable,
            intrinsics,
            type_table,
            stack: RuntimeStack::new(capacity),
            current_function: 0,
            pc: 0,
            state: ThreadState::Idle,
        }
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn stack(&self) -> &RuntimeStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut RuntimeStack {
        &mut self.stack
    }

    /// Resolves a `void*` handle written by `SETSTR` back to the string it
    /// names. This VM has no real address space, so `SETSTR` writes the
    /// string-table index itself into the `void*` slot rather than a
    /// pointer (spec §4.5 SETSTR); intrinsics read it back through here.
    pub fn resolve_string_handle(&self, handle: u64) -> Option<&'e str> {
        u32::try_from(handle).ok().and_then(|index| self.executable.string(index))
    }

    /// The signature of the function currently executing, for fault
    /// messages (spec §7: "Fatal runtime faults print a single message
    /// naming the current function").
    pub fn current_function_signature(&self) -> &str {
        self.executable.function(self.current_function).map(|f| f.signature.as_str()).unwrap_or("<unknown>")
    }

    /// Runs `entry` to completion (spec §4.5). `Ok(())` on a `RETURN` at
    /// call-stack root; `Err(fault)` — with the stacks already cleared — on
    /// any fault.
    pub fn execute(&mut self, entry: usize) -> Result<(), Fault> {
        assert_eq!(self.state, ThreadState::Idle, "execute() is not re-entrant on a given Thread");
        self.current_function = entry;
        self.pc = 0;
        self.stack.push_call_frame_at(None, 0, 0);
        self.state = ThreadState::Running;

        let result = self.run_loop();
        match &result {
            Ok(()) => self.state = ThreadState::Halted,
            Err(_) => {
                self.state = ThreadState::Faulted;
                self.stack.clear();
            }
        }
        result
    }

    fn run_loop(&mut self) -> Result<(), Fault> {
        loop {
            let function = self
                .executable
                .function(self.current_function)
                .ok_or_else(|| Fault::InvalidFunctionIndex(format!("function index {}", self.current_function)))?;
            let Some(instruction) = function.instructions.get(self.pc) else {
                // Spec §9, Open Question 3: the assembler does not require a
                // trailing RETURN; the VM diagnoses it here, by walking off
                // the end of the instruction stream.
                return Err(Fault::MissingReturn);
            };

            match instruction.opcode {
                Opcode::Stls => {
                    self.stack.start_stack_layer();
                    self.pc += 1;
                }
                Opcode::Stle => {
                    self.stack.end_stack_layer()?;
                    self.pc += 1;
                }
                Opcode::Push => {
                    let size = word_operand(instruction, 0)?;
                    self.stack.push_variable(size)?;
                    self.pc += 1;
                }
                Opcode::Pop => {
                    let count = word_operand(instruction, 0)?;
                    self.stack.pop_variable(count)?;
                    self.pc += 1;
                }
                Opcode::SetU32 => {
                    let slot = slot_operand(instruction, 0)?;
                    let value = word_operand(instruction, 1)?;
                    self.stack.write(slot, &value.to_le_bytes());
                    self.pc += 1;
                }
                Opcode::SetStr => {
                    let slot = slot_operand(instruction, 0)?;
                    let string_index = string_operand(instruction, 1)?;
                    self.executable.string(string_index).ok_or(Fault::InvalidStringIndex(string_index))?;
                    self.stack.write(slot, &(string_index as u64).to_le_bytes());
                    self.pc += 1;
                }
                Opcode::Return => match self.stack.pop_call_frame()?.expect("the root call frame is always present while Running") {
                    frame if frame.caller_function.is_none() => return Ok(()),
                    frame => {
                        self.current_function = frame.caller_function.expect("checked above");
                        self.pc = frame.return_instruction;
                    }
                },
                Opcode::CallSig => {
                    let string_index = string_operand(instruction, 0)?;
                    let signature = self.executable.string(string_index).ok_or(Fault::InvalidStringIndex(string_index))?;
                    let callee_index = self
                        .executable
                        .function_index_by_signature(signature)
                        .ok_or_else(|| Fault::InvalidFunctionIndex(signature.to_string()))?;
                    let callee = self.executable.function(callee_index).expect("index came from function_index_by_signature");
                    self.enter_call(callee.return_size, &callee.parameter_sizes, self.pc + 1)?;
                    self.current_function = callee_index;
                    self.pc = 0;
                }
                Opcode::Impl => {
                    let string_index = string_operand(instruction, 0)?;
                    let signature = self.executable.string(string_index).ok_or(Fault::InvalidStringIndex(string_index))?.to_string();
                    let host_fn = self.intrinsics.get(&signature).ok_or_else(|| Fault::MissingIntrinsic(signature.clone()))?;
                    let (return_size, parameter_sizes) = intrinsic_shape(&signature, self.type_table)?;
                    self.enter_call(return_size, &parameter_sizes, self.pc + 1)?;
                    host_fn(self)?;
                    self.stack.pop_call_frame()?;
                    self.pc += 1;
                }
            }
        }
    }

    /// Validates the call site's argument shape against `(return_size,
    /// parameter_sizes)` and opens the callee's call frame over the slots
    /// the caller already pushed (spec §4.5 CALL_SIG: "Validate that the
    /// current top-of-stack contains, in reverse order, the parameter sizes
    /// expected and … one more slot of return_size beneath them").
    fn enter_call(&mut self, return_size: u32, parameter_sizes: &[u32], return_instruction: usize) -> Result<(), Fault> {
        let expected_count = parameter_sizes.len() + usize::from(return_size != 0);
        let tail = self.stack.tail_sizes(expected_count).ok_or(Fault::ParameterReturnMismatch)?.to_vec();

        let mut expected = Vec::with_capacity(expected_count);
        if return_size != 0 {
            expected.push(return_size);
        }
        expected.extend_from_slice(parameter_sizes);
        if tail != expected {
            return Err(Fault::ParameterReturnMismatch);
        }

        let pushed_bytes: u32 = tail.iter().sum();
        let base = self.stack.stack_counter() - pushed_bytes;
        self.stack.push_call_frame_at(Some(self.current_function), return_instruction, base);
        Ok(())
    }
}

/// An intrinsic's call shape has to be recovered from its signature text
/// alone (spec §4.5 IMPL): it has no `FunctionRecord` carrying
/// `parameter_sizes`/`return_size` the way a bytecode-defined function does.
fn intrinsic_shape(signature: &str, type_table: &TypeTable) -> Result<(u32, Vec<u32>), Fault> {
    let (return_type, _name, param_types) = signature::parse(signature).ok_or_else(|| Fault::MissingIntrinsic(signature.to_string()))?;
    let return_size = type_table.size_of(&format!("@{return_type}")).unwrap_or(0);
    let parameter_sizes = param_types
        .iter()
        .filter_map(|t| type_table.size_of(&format!("@{t}")))
        .filter(|size| *size != 0)
        .collect();
    Ok((return_size, parameter_sizes))
}

fn word_operand(instruction: &Instruction, index: usize) -> Result<u32, Fault> {
    match instruction.operands.get(index) {
        Some(Operand::Word(v)) => Ok(*v),
        _ => Err(Fault::UnknownOpcode(instruction.opcode as u32)),
    }
}

fn slot_operand(instruction: &Instruction, index: usize) -> Result<u32, Fault> {
    match instruction.operands.get(index) {
        Some(Operand::VariableSlot(v)) => Ok(*v),
        _ => Err(Fault::UnknownOpcode(instruction.opcode as u32)),
    }
}

fn string_operand(instruction: &Instruction, index: usize) -> Result<u32, Fault> {
    match instruction.operands.get(index) {
        Some(Operand::StringIndex(v)) => Ok(*v),
        _ => Err(Fault::UnknownOpcode(instruction.opcode as u32)),
    }
}
