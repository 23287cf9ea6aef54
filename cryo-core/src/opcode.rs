//! Opcodes and the `(mnemonic, parameter-type-signature) -> opcode` /
//! `opcode -> operand-layout` instruction table.
//!
//! This table is the single source of truth shared by the assembler (which
//! looks it up by mnemonic + token shape while emitting) and the linker
//! (which looks it up by opcode while relocating). The opcode enum carries
//! explicit discriminants and derives `FromRepr` rather than hand-rolling a
//! `match` over raw `u32`s.

use cryo_derive::FromRepr;

use crate::token::TokenKind;

/// Opcode values are part of the wire format and MUST remain stable once
/// an object file has been written with them.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, FromRepr)]
pub enum Opcode {
    Stls = 0x0000_0001,
    Stle = 0x0000_0002,
    Push = 0x0000_0003,
    Pop = 0x0000_0004,
    SetU32 = 0x0000_0005,
    SetStr = 0x0000_0007,
    Return = 0x0100_0000,
    CallSig = 0x3000_0000,
    Impl = 0x4000_0000,
}

/// The block-end sentinel can never collide with a legal opcode word.
pub const BLOCK_END: u32 = 0xFFFF_FFFF;

impl Opcode {
    pub fn from_word(word: u32) -> Option<Self> {
        Self::from_repr(word)
    }
}

/// Tagged operand kind: lets the linker's relocation pass be an exhaustive
/// match instead of an ad-hoc per-opcode switch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OperandKind {
    /// An opaque word: a size, a count, a literal value.
    Word,
    /// A variable's byte offset within the current call frame. Never
    /// relocated, kept distinct from `Word` purely for documentation.
    VariableSlot,
    /// An index into the string-literal table. The only operand kind the
    /// linker rewrites.
    StringIndex,
}

/// One row of the instruction table: how a mnemonic plus its parameter
/// token shape maps to an opcode, and what that opcode's wire operands
/// look like.
pub struct InstructionDef {
    pub mnemonic: &'static str,
    pub token_shape: &'static [TokenKind],
    pub opcode: Opcode,
    pub operands: &'static [OperandKind],
}

macro_rules! token_kinds {
    () => {
        &[] as &[TokenKind]
    };
    ($($kind:ident),+ $(,)?) => {
        &[$(TokenKind::$kind),+] as &[TokenKind]
    };
}

macro_rules! operand_kinds {
    () => {
        &[] as &[OperandKind]
    };
    ($($kind:ident),+ $(,)?) => {
        &[$(OperandKind::$kind),+] as &[OperandKind]
    };
}

/// Single source of truth for `(mnemonic, operand-kinds) -> opcode` and
/// `opcode -> operand-layout`.
pub static INSTRUCTION_TABLE: &[InstructionDef] = &[
    InstructionDef {
        mnemonic: "STLS",
        token_shape: token_kinds!(),
        opcode: Opcode::Stls,
        operands: operand_kinds!(),
    },
    InstructionDef {
        mnemonic: "STLE",
        token_shape: token_kinds!(),
        opcode: Opcode::Stle,
        operands: operand_kinds!(),
    },
    InstructionDef {
        mnemonic: "PUSH",
        token_shape: token_kinds!(Type, Id),
        opcode: Opcode::Push,
        operands: operand_kinds!(Word),
    },
    InstructionDef {
        mnemonic: "POP",
        token_shape: token_kinds!(U32),
        opcode: Opcode::Pop,
        operands: operand_kinds!(Word),
    },
    InstructionDef {
        mnemonic: "SETU32",
        token_shape: token_kinds!(Id, U32),
        opcode: Opcode::SetU32,
        operands: operand_kinds!(VariableSlot, Word),
    },
    InstructionDef {
        mnemonic: "SETSTR",
        token_shape: token_kinds!(Id, StringLiteral),
        opcode: Opcode::SetStr,
        operands: operand_kinds!(VariableSlot, StringIndex),
    },
    InstructionDef {
        mnemonic: "RETURN",
        token_shape: token_kinds!(),
        opcode: Opcode::Return,
        operands: operand_kinds!(),
    },
    InstructionDef {
        mnemonic: "CALL",
        token_shape: token_kinds!(Id),
        opcode: Opcode::CallSig,
        operands: operand_kinds!(StringIndex),
    },
    InstructionDef {
        mnemonic: "IMPL",
        token_shape: token_kinds!(Id),
        opcode: Opcode::Impl,
        operands: operand_kinds!(StringIndex),
    },
];

/// Looks up an instruction by mnemonic and the exact sequence of parameter
/// token kinds that followed it. `None` means the shape didn't match any
/// registered instruction (`UNEXPECTED_TOKEN_IN_INSTRUCTION_PARAMETERS`).
pub fn lookup_by_shape(mnemonic: &str, shape: &[TokenKind]) -> Option<&'static InstructionDef> {
    INSTRUCTION_TABLE
        .iter()
        .find(|def| def.mnemonic == mnemonic && def.token_shape == shape)
}

/// Whether `word` is a registered instruction mnemonic at all, regardless
/// of parameter shape (used by the tokenizer to classify `Instruction`
/// tokens).
pub fn is_instruction_mnemonic(word: &str) -> bool {
    INSTRUCTION_TABLE.iter().any(|def| def.mnemonic == word)
}

/// The operand layout for `opcode`, used by the linker's relocation pass
/// to know which trailing words (if any) are string-table indices.
pub fn operand_layout(opcode: Opcode) -> &'static [OperandKind] {
    INSTRUCTION_TABLE
        .iter()
        .find(|def| def.opcode == opcode)
        .map(|def| def.operands)
        .unwrap_or(&[])
}
