//! Runtime faults (spec §7's "runtime" diagnostic kind): stack overflow,
//! bad string/function index, parameter/return-slot mismatch, unknown
//! opcode, missing intrinsic, and the stack-layer misuses of spec §4.5.
//!
//! Spec §7: "Fatal runtime faults print a single message naming the current
//! function and abort the thread" — a much thinner shape than the
//! source-located `Diagnostic` the compiler stages use, since by the time
//! the VM is running there's no source text left to point at.

use std::fmt;

use cryo_core::error::codes;

#[derive(Debug, PartialEq, Eq)]
pub enum Fault {
    StackOverflow,
    LayerUnderflow,
    NoOpenLayer,
    InvalidStringIndex(u32),
    InvalidFunctionIndex(String),
    ParameterReturnMismatch,
    UnknownOpcode(u32),
    MissingIntrinsic(String),
    MissingReturn,
    NullPointer,
}

impl Fault {
    pub fn code(&self) -> &'static str {
        match self {
            Fault::StackOverflow => codes::STACK_OVERFLOW,
            Fault::LayerUnderflow | Fault::NoOpenLayer => codes::RUNTIME_LAYER_UNDERFLOW,
            Fault::InvalidStringIndex(_) => codes::INVALID_STRING_INDEX,
            Fault::InvalidFunctionIndex(_) => codes::INVALID_FUNCTION_INDEX,
            Fault::ParameterReturnMismatch => codes::PARAMETER_RETURN_MISMATCH,
            Fault::UnknownOpcode(_) => codes::UNKNOWN_OPCODE,
            Fault::MissingIntrinsic(_) => codes::MISSING_INTRINSIC,
            Fault::MissingReturn => codes::MISSING_RETURN,
            Fault::NullPointer => codes::NULL_POINTER,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::StackOverflow => write!(f, "stack overflow"),
            Fault::LayerUnderflow => write!(f, "attempt to pop more variables than are live"),
            Fault::NoOpenLayer => write!(f, "STLE with no open stack layer"),
            Fault::InvalidStringIndex(i) => write!(f, "invalid string literal index {i}"),
            Fault::InvalidFunctionIndex(sig) => write!(f, "attempt to call non-existent function '{sig}'"),
            Fault::ParameterReturnMismatch => write!(f, "call site's stack shape does not match the callee's parameters/return"),
            Fault::UnknownOpcode(word) => write!(f, "unknown instruction word 0x{word:08X}"),
            Fault::MissingIntrinsic(sig) => write!(f, "IMPL function '{sig}' does not exist"),
            Fault::MissingReturn => write!(f, "function fell off its last instruction without a RETURN"),
            Fault::NullPointer => write!(f, "null pointer dereference"),
        }
    }
}
