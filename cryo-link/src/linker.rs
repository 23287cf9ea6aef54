//! Parse → unify strings → relocate → serialize (spec §4.3).
//!
//! Each object's string table is decoded with an `old_index -> new_index`
//! map built as it's folded into the unified set, the same first-seen-order
//! interning `cryo_asm::assembler` already uses within a single object,
//! extended here across every input object.

use std::fs;
use std::path::Path;

use fxhash::FxHashMap;

use cryo_core::error::codes;
use cryo_core::ir::{FunctionRecord, Instruction, ObjectFile, Operand};
use cryo_core::wire::{EXECUTABLE_HEADER, OBJECT_HEADER};
use cryo_core::{Diagnostic, ErrorQueue, Severity};

struct ParsedObject {
    path: std::path::PathBuf,
    object: ObjectFile,
}

pub fn link(object_paths: &[impl AsRef<Path>], out_path: impl AsRef<Path>) -> ErrorQueue {
    let mut errors = ErrorQueue::new();
    let mut parsed = Vec::with_capacity(object_paths.len());

    for path in object_paths {
        let path = path.as_ref();
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), "parsing object");

        match parse_object(path) {
            Ok(object) => parsed.push(ParsedObject { path: path.to_path_buf(), object }),
            Err(diagnostic) => {
                errors.push(diagnostic);
                if errors.is_critical() {
                    return errors;
                }
            }
        }
    }

    if errors.has_errors() {
        return errors;
    }

    // Unify strings: union every object's string list into one ordered set,
    // first-seen order across objects (spec §3: "String-table order is
    // implementation-defined but must be consistent with the indices
    // embedded in the code section").
    let mut unified_order = Vec::new();
    let mut unified_index: FxHashMap<String, u32> = FxHashMap::default();
    let mut remaps: Vec<FxHashMap<u32, u32>> = Vec::with_capacity(parsed.len());

    for parsed_object in &parsed {
        let mut remap = FxHashMap::default();
        for (old_index, string) in parsed_object.object.strings.iter().enumerate() {
            let new_index = *unified_index.entry(string.clone()).or_insert_with(|| {
                let i = unified_order.len() as u32;
                unified_order.push(string.clone());
                i
            });
            remap.insert(old_index as u32, new_index);
        }
        remaps.push(remap);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(strings = unified_order.len(), "string tables unified");

    // Duplicate-signature check (spec §4.3: "a hard error").
    let mut seen_signatures: FxHashMap<String, std::path::PathBuf> = FxHashMap::default();
    for parsed_object in &parsed {
        for function in &parsed_object.object.functions {
            if let Some(first_path) = seen_signatures.get(&function.signature) {
                errors.push(Diagnostic::new(
                    codes::DUPLICATE_SIGNATURE,
                    Severity::Error,
                    format!(
                        "function '{}' is defined in both {} and {}",
                        function.signature,
                        first_path.display(),
                        parsed_object.path.display()
                    ),
                    &parsed_object.path,
                    0,
                    "",
                    &function.signature,
                ));
            } else {
                seen_signatures.insert(function.signature.clone(), parsed_object.path.clone());
            }
        }
    }

    if errors.has_errors() {
        return errors;
    }

    // Relocate every StringIndex operand (SETSTR's string operand, CALL's
    // and IMPL's signature operand) using the owning object's remap. Every
    // other operand kind is opaque to the linker and passed through
    // unchanged (spec §4.3). Every old index a parsed object can emit must
    // have been registered while unifying strings above; a miss means the
    // object is corrupt, not that the index should pass through unchanged.
    let mut functions = Vec::new();
    for (parsed_object, remap) in parsed.iter().zip(&remaps) {
        for function in &parsed_object.object.functions {
            match relocate_function(function, remap) {
                Ok(relocated) => functions.push(relocated),
                Err(missing) => {
                    for old_index in missing {
                        errors.push(Diagnostic::new(
                            codes::MALFORMED_OBJECT,
                            Severity::Error,
                            format!(
                                "function '{}' references string index {old_index}, which was never registered during string-table unification",
                                function.signature
                            ),
                            &parsed_object.path,
                            0,
                            "",
                            &function.signature,
                        ));
                    }
                }
            }
        }
    }

    if errors.has_errors() {
        return errors;
    }

    let executable = ObjectFile { strings: unified_order, functions };

    #[cfg(feature = "tracing")]
    tracing::debug!(functions = executable.functions.len(), "relocation complete");

    let bytes = cryo_core::objfile::write(EXECUTABLE_HEADER, &executable);
    if let Err(io_err) = fs::write(out_path.as_ref(), bytes) {
        errors.push(Diagnostic::new(
            codes::UNABLE_TO_OPEN_FILE,
            Severity::Critical,
            io_err.to_string(),
            out_path.as_ref(),
            0,
            "",
            "",
        ));
    }

    errors
}

/// Relocates every instruction in `function`. `Err` carries every
/// old string index the instruction stream referenced that `remap` has no
/// entry for, rather than silently falling back to the stale pre-unification
/// index (spec §7: errors over silent corruption).
fn relocate_function(function: &FunctionRecord, remap: &FxHashMap<u32, u32>) -> Result<FunctionRecord, Vec<u32>> {
    let mut missing = Vec::new();
    let mut instructions = Vec::with_capacity(function.instructions.len());
    for instruction in &function.instructions {
        match relocate_instruction(instruction, remap) {
            Ok(relocated) => instructions.push(relocated),
            Err(old_indices) => missing.extend(old_indices),
        }
    }
    if !missing.is_empty() {
        return Err(missing);
    }
    Ok(FunctionRecord {
        signature: function.signature.clone(),
        parameter_sizes: function.parameter_sizes.clone(),
        return_size: function.return_size,
        instructions,
    })
}

fn relocate_instruction(instruction: &Instruction, remap: &FxHashMap<u32, u32>) -> Result<Instruction, Vec<u32>> {
    let mut missing = Vec::new();
    let mut operands = Vec::with_capacity(instruction.operands.len());
    for operand in &instruction.operands {
        match operand {
            Operand::StringIndex(old) => match remap.get(old) {
                Some(new) => operands.push(Operand::StringIndex(*new)),
                None => missing.push(*old),
            },
            other => operands.push(*other),
        }
    }
    if !missing.is_empty() {
        return Err(missing);
    }
    Ok(Instruction { opcode: instruction.opcode, operands })
}

fn parse_object(path: &Path) -> Result<ObjectFile, Diagnostic> {
    let bytes = fs::read(path).map_err(|io_err| {
        Diagnostic::new(codes::UNABLE_TO_OPEN_FILE, Severity::Critical, io_err.to_string(), path, 0, "", "")
    })?;

    cryo_core::objfile::read(&bytes, OBJECT_HEADER).map_err(|io_err| {
        let code = if io_err.kind() == std::io::ErrorKind::InvalidData && bytes.len() >= 8 && &bytes[..8] != OBJECT_HEADER {
            codes::HEADER_MISMATCH
        } else {
            codes::MALFORMED_OBJECT
        };
        Diagnostic::new(code, Severity::Critical, io_err.to_string(), path, 0, "", "")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryo_core::ir::{FunctionRecord, Instruction, ObjectFile, Operand};
    use cryo_core::opcode::Opcode;
    use cryo_core::wire::OBJECT_HEADER;
    use std::fs;

    fn write_object(path: &Path, object: &ObjectFile) {
        let bytes = cryo_core::objfile::write(OBJECT_HEADER, object);
        fs::write(path, bytes).unwrap();
    }

    fn one_function_object(name: &str, literal: &str) -> ObjectFile {
        let signature = format!("$void::{name}");
        ObjectFile {
            strings: vec![signature.clone(), literal.to_string()],
            functions: vec![FunctionRecord {
                signature,
                parameter_sizes: vec![],
                return_size: 0,
                instructions: vec![
                    Instruction { opcode: Opcode::Stls, operands: vec![] },
                    Instruction { opcode: Opcode::Push, operands: vec![Operand::Word(8)] },
                    Instruction {
                        opcode: Opcode::SetStr,
                        operands: vec![Operand::VariableSlot(0), Operand::StringIndex(1)],
                    },
                    Instruction { opcode: Opcode::Stle, operands: vec![] },
                    Instruction { opcode: Opcode::Return, operands: vec![] },
                ],
            }],
        }
    }

    #[test]
    fn unifies_a_shared_string_literal_across_two_objects() {
        let dir = tempdir();
        let a_path = dir.join("a.cryi");
        let b_path = dir.join("b.cryi");
        write_object(&a_path, &one_function_object("a", "X"));
        write_object(&b_path, &one_function_object("b", "X"));

        let out_path = dir.join("out.crye");
        let errors = link(&[&a_path, &b_path], &out_path);
        assert!(!errors.has_errors(), "unexpected errors: {errors}");

        let bytes = fs::read(&out_path).unwrap();
        let executable = cryo_core::objfile::read(&bytes, EXECUTABLE_HEADER).unwrap();

        let x_count = executable.strings.iter().filter(|s| *s == "X").count();
        assert_eq!(x_count, 1, "'X' must appear exactly once in the unified string table");

        let x_index = executable.strings.iter().position(|s| s == "X").unwrap() as u32;
        for function in &executable.functions {
            let set_str = function
                .instructions
                .iter()
                .find(|i| i.opcode == Opcode::SetStr)
                .unwrap();
            assert_eq!(set_str.operands[1], Operand::StringIndex(x_index));
        }

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn a_string_index_with_no_remap_entry_is_reported_not_passed_through() {
        let dir = tempdir();
        let bad_path = dir.join("bad.cryi");
        // The object's own string table has one entry, but the instruction
        // references index 5 — out of range, so string-table unification
        // never registers a remap for it.
        let object = ObjectFile {
            strings: vec!["$void::main".to_string()],
            functions: vec![FunctionRecord {
                signature: "$void::main".to_string(),
                parameter_sizes: vec![],
                return_size: 0,
                instructions: vec![
                    Instruction { opcode: Opcode::Stls, operands: vec![] },
                    Instruction { opcode: Opcode::Push, operands: vec![Operand::Word(8)] },
                    Instruction {
                        opcode: Opcode::SetStr,
                        operands: vec![Operand::VariableSlot(0), Operand::StringIndex(5)],
                    },
                    Instruction { opcode: Opcode::Stle, operands: vec![] },
                    Instruction { opcode: Opcode::Return, operands: vec![] },
                ],
            }],
        };
        write_object(&bad_path, &object);

        let out_path = dir.join("out.crye");
        let errors = link(&[&bad_path], &out_path);
        assert!(errors.iter().any(|d| d.code == codes::MALFORMED_OBJECT));
        assert!(!out_path.exists(), "no executable should be written when relocation fails");

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn duplicate_signatures_across_objects_are_rejected() {
        let dir = tempdir();
        let a_path = dir.join("a.cryi");
        let b_path = dir.join("b.cryi");
        write_object(&a_path, &one_function_object("main", "X"));
        write_object(&b_path, &one_function_object("main", "Y"));

        let out_path = dir.join("out.crye");
        let errors = link(&[&a_path, &b_path], &out_path);
        assert!(errors.iter().any(|d| d.code == codes::DUPLICATE_SIGNATURE));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn header_mismatch_is_reported_and_no_executable_is_written() {
        let dir = tempdir();
        let bad_path = dir.join("bad.cryi");
        fs::write(&bad_path, b"CRYOEXE\0\0\0\0\0").unwrap();

        let out_path = dir.join("out.crye");
        let errors = link(&[&bad_path], &out_path);
        assert!(errors.iter().any(|d| d.code == codes::HEADER_MISMATCH));
        assert!(!out_path.exists());

        std::fs::remove_dir_all(dir).ok();
    }

    fn tempdir() -> std::path::PathBuf {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut dir = std::env::temp_dir();
        dir.push(format!("cryo-link-test-{}-{n}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
