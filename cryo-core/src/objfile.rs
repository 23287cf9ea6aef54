//! Shared `.cryi`/`.crye` body layout: string table, function declarations,
//! code — written and read by both the assembler (producing `.cryi`) and the
//! linker (consuming `.cryi`, producing `.crye`), and read again by the VM
//! loader. Only the 8-byte header differs between the two file kinds (spec
//! §9, Open Question 2).
//!
//! Every [`FunctionRecord`] is already fully built in memory by the time
//! this runs, so the code block is laid out first — each function's start
//! offset is a known fact by the time its declaration is written, with no
//! placeholder to back-patch later.

use std::io;

use crate::error::codes::MALFORMED_OBJECT;
use crate::ir::{FunctionRecord, Instruction, ObjectFile, Operand};
use crate::opcode::{operand_layout, Opcode, OperandKind, BLOCK_END};
use crate::wire::{self, ByteWriter};

pub fn write(header: &[u8; 8], object: &ObjectFile) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_header(header);
    w.write_string_table(object.strings.iter().map(String::as_str));

    // Lay out the code block first so each function's start offset is known
    // before its declaration is written — no back-patching needed once the
    // code is already assembled in memory (the back-patch in the original
    // happens because it streams function bodies out one at a time; here
    // every `FunctionRecord` is already fully built).
    let mut code = ByteWriter::new();
    let mut starts = Vec::with_capacity(object.functions.len());
    let mut word_counts = Vec::with_capacity(object.functions.len());
    for function in &object.functions {
        starts.push(code.word_index());
        let before = code.word_index();
        for instruction in &function.instructions {
            write_instruction(&mut code, instruction);
        }
        word_counts.push(code.word_index() - before);
    }

    for ((function, start), word_count) in object.functions.iter().zip(&starts).zip(&word_counts) {
        let signature_index = object
            .strings
            .iter()
            .position(|s| s == &function.signature)
            .expect("function signature must be interned into ObjectFile::strings before writing") as u32;
        write_function_decl(&mut w, function, signature_index, *start as u32, *word_count as u32);
    }
    w.write_block_end();

    let code_bytes = code.into_bytes();
    for chunk in code_bytes.chunks_exact(4) {
        w.write_u32(u32::from_le_bytes(chunk.try_into().unwrap()));
    }
    w.write_block_end();

    w.into_bytes()
}

fn write_instruction(w: &mut ByteWriter, instruction: &Instruction) {
    w.write_u32(instruction.opcode as u32);
    for operand in &instruction.operands {
        w.write_u32(operand.raw_value());
    }
}

fn write_function_decl(w: &mut ByteWriter, function: &FunctionRecord, signature_index: u32, start_word: u32, word_count: u32) {
    w.write_u32(signature_index);
    w.write_u32(function.return_size);
    w.write_u32(function.parameter_sizes.len() as u32);
    for size in &function.parameter_sizes {
        w.write_u32(*size);
    }
    w.write_u32(start_word);
    w.write_u32(word_count);
}

pub fn read(bytes: &[u8], expected_header: &[u8; 8]) -> io::Result<ObjectFile> {
    wire::validate_header(bytes, expected_header)?;
    let (strings, after_strings) = wire::read_string_table(bytes, 8)?;

    let mut decls = Vec::new();
    let mut pos = after_strings;
    loop {
        let word = wire::read_u32_le(bytes, pos)?;
        if word == BLOCK_END {
            pos += 4;
            break;
        }
        let signature_index = word;
        let return_size = wire::read_u32_le(bytes, pos + 4)?;
        let param_count = wire::read_u32_le(bytes, pos + 8)? as usize;
        let mut cursor = pos + 12;
        let mut parameter_sizes = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            parameter_sizes.push(wire::read_u32_le(bytes, cursor)?);
            cursor += 4;
        }
        let start_word = wire::read_u32_le(bytes, cursor)?;
        let word_count = wire::read_u32_le(bytes, cursor + 4)?;
        cursor += 8;
        pos = cursor;

        let signature = strings
            .get(signature_index as usize)
            .cloned()
            .ok_or_else(|| malformed("function declaration names a string index out of range"))?;
        decls.push((signature, parameter_sizes, return_size, start_word, word_count));
    }

    let code_start = pos;
    let (code_words, _code_end) = read_code_block(bytes, code_start)?;

    let mut functions = Vec::with_capacity(decls.len());
    for (signature, parameter_sizes, return_size, start_word, word_count) in decls {
        let region = &code_words[start_word as usize..(start_word + word_count) as usize];
        let instructions = decode_instructions(region)?;
        functions.push(FunctionRecord { signature, parameter_sizes, return_size, instructions });
    }

    Ok(ObjectFile { strings, functions })
}

fn read_code_block(bytes: &[u8], start: usize) -> io::Result<(Vec<u32>, usize)> {
    let mut words = Vec::new();
    let mut pos = start;
    loop {
        let word = wire::read_u32_le(bytes, pos)?;
        pos += 4;
        if word == BLOCK_END {
            break;
        }
        words.push(word);
    }
    Ok((words, pos))
}

fn decode_instructions(words: &[u32]) -> io::Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let opcode = Opcode::from_word(words[i]).ok_or_else(|| malformed("unrecognized opcode word"))?;
        i += 1;
        let layout = operand_layout(opcode);
        let mut operands = Vec::with_capacity(layout.len());
        for kind in layout {
            let value = *words.get(i).ok_or_else(|| malformed("instruction is missing operand words"))?;
            operands.push(match kind {
                OperandKind::Word => Operand::Word(value),
                OperandKind::VariableSlot => Operand::VariableSlot(value),
                OperandKind::StringIndex => Operand::StringIndex(value),
            });
            i += 1;
        }
        instructions.push(Instruction { opcode, operands });
    }
    Ok(instructions)
}

fn malformed(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("{MALFORMED_OBJECT}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::OBJECT_HEADER;

    #[test]
    fn round_trips_a_function_with_mixed_operand_kinds() {
        let object = ObjectFile {
            strings: vec!["$void::main".to_string(), "hello".to_string()],
            functions: vec![FunctionRecord {
                signature: "$void::main".to_string(),
                parameter_sizes: vec![],
                return_size: 0,
                instructions: vec![
                    Instruction { opcode: Opcode::Stls, operands: vec![] },
                    Instruction {
                        opcode: Opcode::SetStr,
                        operands: vec![Operand::VariableSlot(0), Operand::StringIndex(1)],
                    },
                    Instruction { opcode: Opcode::Stle, operands: vec![] },
                    Instruction { opcode: Opcode::Return, operands: vec![] },
                ],
            }],
        };

        let bytes = write(OBJECT_HEADER, &object);
        let read_back = read(&bytes, OBJECT_HEADER).unwrap();

        assert_eq!(read_back.strings, object.strings);
        assert_eq!(read_back.functions.len(), 1);
        assert_eq!(read_back.functions[0].signature, "$void::main");
        assert_eq!(read_back.functions[0].instructions.len(), 4);
        assert_eq!(read_back.functions[0].instructions[1].operands, object.functions[0].instructions[1].operands);
    }
}
