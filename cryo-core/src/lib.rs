pub mod error;
pub mod ir;
pub mod objfile;
pub mod opcode;
pub mod signature;
pub mod source;
pub mod token;
pub mod types;
pub mod wire;

pub use error::{Diagnostic, ErrorQueue, Severity};
pub use ir::{FunctionRecord, Instruction, ObjectFile, Operand};
pub use opcode::{InstructionDef, Opcode, OperandKind};
pub use source::SourceFile;
pub use token::{Token, TokenKind};
pub use types::TypeTable;
