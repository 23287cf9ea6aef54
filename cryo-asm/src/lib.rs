//! The Cryo assembler: `.crya` text in, `.cryi` object out.

pub mod assembler;
pub mod object;
pub mod tokenizer;
pub mod varstack;

use std::path::{Path, PathBuf};

use cryo_core::{ErrorQueue, SourceFile, TypeTable};

/// Tokenizes, validates, and assembles `source_path`, writing the resulting
/// object next to it with a `.cryi` extension. Returns the object's path
/// regardless of whether assembly succeeded — callers must check
/// `errors.has_errors()` before trusting the file exists or is well-formed
/// (spec §7: a build with `error`-or-higher diagnostics must fail).
pub fn assemble(source_path: impl AsRef<Path>) -> (PathBuf, ErrorQueue) {
    let source_path = source_path.as_ref();
    let object_path = source_path.with_extension("cryi");

    let source = match SourceFile::read(source_path) {
        Ok(source) => source,
        Err(io_err) => {
            let mut errors = ErrorQueue::new();
            errors.push(cryo_core::Diagnostic::new(
                cryo_core::error::codes::UNABLE_TO_OPEN_FILE,
                cryo_core::Severity::Critical,
                io_err.to_string(),
                source_path,
                0,
                "",
                "",
            ));
            return (object_path, errors);
        }
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(path = %source_path.display(), "tokenizing");

    let mut errors = ErrorQueue::new();
    let tokens = tokenizer::tokenize(&source, &mut errors);
    if errors.is_critical() {
        return (object_path, errors);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(count = tokens.len(), "tokenized");

    let type_table = TypeTable::new();
    let (object, assemble_errors) = assembler::assemble_tokens(&tokens, &source, &type_table);
    errors.extend(assemble_errors);

    #[cfg(feature = "tracing")]
    tracing::debug!(functions = object.functions.len(), strings = object.strings.len(), "assembled");

    if !errors.has_errors() {
        if let Err(io_err) = object::write_object(&object_path, &object) {
            errors.push(cryo_core::Diagnostic::new(
                cryo_core::error::codes::UNABLE_TO_OPEN_FILE,
                cryo_core::Severity::Critical,
                io_err.to_string(),
                &object_path,
                0,
                "",
                "",
            ));
        }
    }

    (object_path, errors)
}
