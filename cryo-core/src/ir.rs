//! The in-memory shape shared by the assembler (producer), the linker
//! (consumer + producer), and the VM loader (consumer): a decoded
//! instruction stream plus the function records it's grouped into.
//!
//! `Operand` is a tagged variant rather than a bare `u32`, so the linker's
//! relocation pass is an exhaustive match over [`OperandKind`] instead of a
//! per-opcode special case — the instruction stream carries what each word
//! *means*, not just its bits.

use crate::opcode::{Opcode, OperandKind};

/// A single decoded operand. Wire representation is always one `u32` word;
/// the variant records what that word *means*, since only [`Operand::StringIndex`]
/// is subject to the linker's table-unification rewrite.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operand {
    Word(u32),
    VariableSlot(u32),
    StringIndex(u32),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Word(_) => OperandKind::Word,
            Operand::VariableSlot(_) => OperandKind::VariableSlot,
            Operand::StringIndex(_) => OperandKind::StringIndex,
        }
    }

    pub fn raw_value(&self) -> u32 {
        match self {
            Operand::Word(v) | Operand::VariableSlot(v) | Operand::StringIndex(v) => *v,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

/// One function's signature, frame-layout metadata, and code. `@void`
/// parameter placeholders appear in the signature text but are zero-sized,
/// so they're omitted from `parameter_sizes`.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub signature: String,
    pub parameter_sizes: Vec<u32>,
    pub return_size: u32,
    pub instructions: Vec<Instruction>,
}

/// An assembled `.cryi` object, or — after linking — the contents of a
/// `.crye` executable: a unified string table plus every function's code.
/// The two differ only in which header they're written under.
#[derive(Debug, Clone, Default)]
pub struct ObjectFile {
    pub strings: Vec<String>,
    pub functions: Vec<FunctionRecord>,
}
