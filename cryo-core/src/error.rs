//! Diagnostic collection shared by every stage of the toolchain: a plain
//! struct carrying just enough context to explain a failure, widened into a
//! queue since the assembler and linker must keep going past recoverable
//! errors instead of aborting on the first one (spec §7).

use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Error-code constants, grouped by stage. Stable strings: part of the
/// toolchain's user-facing contract, not an implementation detail.
pub mod codes {
    // Lexical
    pub const INVALID_CHARACTER_IN_ID_OR_TYPE: &str = "EA-0x1001";
    pub const COULD_NOT_DETERMINE_TOKEN_TYPE: &str = "EA-0x1002";
    pub const MULTIPLE_DOTS_IN_VALUE: &str = "EA-0x1003";
    pub const STRING_LITERAL_MISSING_END: &str = "EA-0x1004";

    // Structural
    pub const UNEXPECTED_END: &str = "EA-0x1010";
    pub const FUNCTION_DEFINITION_MISSING_IDENTIFIER: &str = "EA-0x1011";
    pub const FUNCTION_DEFINITION_MISSING_RETURN_DECLARATION: &str = "EA-0x1012";
    pub const FUNCTION_DEFINITION_MISSING_RETURN_TYPE: &str = "EA-0x1013";
    pub const FUNCTION_DEFINITION_MISSING_BODY: &str = "EA-0x1014";
    pub const INVALID_FUNCTION_DEFINITION: &str = "EA-0x1015";
    pub const INVALID_TOKEN_IN_FUNCTION_BODY: &str = "EA-0x1016";
    pub const UNKNOWN_TYPE: &str = "EA-0x1017";

    // Instruction-shape
    pub const UNEXPECTED_TOKEN_IN_INSTRUCTION_PARAMETERS: &str = "EA-0x1020";
    pub const MISSING_SEMICOLON: &str = "EA-0x1021";

    // Semantic
    pub const VARIABLE_NAME_ALREADY_IN_USE: &str = "EA-0x1030";
    pub const STACK_DOES_NOT_CONTAIN_VARIABLES_TO_POP: &str = "EA-0x1031";
    pub const VARIABLE_DOES_NOT_EXIST: &str = "EA-0x1032";
    pub const NO_STACK_LAYERS_TO_BE_CLOSED: &str = "EA-0x1033";
    pub const NUMERIC_LITERAL_OUT_OF_RANGE: &str = "EA-0x1034";

    // I/O (shared by any stage that opens or writes a file)
    pub const UNABLE_TO_OPEN_FILE: &str = "EI-0x3000";

    // Linker
    pub const HEADER_MISMATCH: &str = "EL-0x2001";
    pub const DUPLICATE_SIGNATURE: &str = "EL-0x2002";
    pub const MALFORMED_OBJECT: &str = "EL-0x2003";

    // Runtime (VM faults: spec §7 "runtime" taxonomy entry)
    pub const STACK_OVERFLOW: &str = "ER-0x4001";
    pub const INVALID_STRING_INDEX: &str = "ER-0x4002";
    pub const INVALID_FUNCTION_INDEX: &str = "ER-0x4003";
    pub const PARAMETER_RETURN_MISMATCH: &str = "ER-0x4004";
    pub const UNKNOWN_OPCODE: &str = "ER-0x4005";
    pub const MISSING_INTRINSIC: &str = "ER-0x4006";
    pub const RUNTIME_LAYER_UNDERFLOW: &str = "ER-0x4007";
    pub const MISSING_RETURN: &str = "ER-0x4008";
    pub const NULL_POINTER: &str = "ER-0x4009";
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub enum Severity {
    None,
    Warning,
    Error,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::None
    }
}

/// A single diagnostic, carrying enough of the source to render the
/// two-line form described in spec §7: `code path at line N: … <token>`
/// followed by the message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: &'static str,
    pub message: String,
    pub severity: Severity,
    pub path: PathBuf,
    pub line: u32,
    pub line_text: String,
    pub token_text: String,
}

impl Diagnostic {
    pub fn new(
        code: &'static str,
        severity: Severity,
        message: impl Into<String>,
        path: impl AsRef<Path>,
        line: u32,
        line_text: impl Into<String>,
        token_text: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            severity,
            path: path.as_ref().to_path_buf(),
            line,
            line_text: line_text.into(),
            token_text: token_text.into(),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} at line {}: {}",
            self.code,
            self.path.display(),
            self.line,
            self.line_text.trim_end()
        )?;
        write!(f, "  <{}> {}", self.token_text, self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Threaded through each stage instead of exception-style control flow
/// (spec §9, Design Notes). Severity of `warning`/`error` accumulates;
/// `critical` is meant to short-circuit the stage that pushed it — callers
/// check [`ErrorQueue::is_critical`] right after every push.
#[derive(Debug, Default, Clone)]
pub struct ErrorQueue {
    severity: Severity,
    diagnostics: VecDeque<Diagnostic>,
}

impl ErrorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity > self.severity {
            self.severity = diagnostic.severity;
        }
        self.diagnostics.push_back(diagnostic);
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// `error` or higher: a build using this queue must fail.
    pub fn has_errors(&self) -> bool {
        self.severity >= Severity::Error
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn extend(&mut self, other: ErrorQueue) {
        if other.severity > self.severity {
            self.severity = other.severity;
        }
        self.diagnostics.extend(other.diagnostics);
    }
}

impl IntoIterator for ErrorQueue {
    type Item = Diagnostic;
    type IntoIter = std::collections::vec_deque::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl Display for ErrorQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
