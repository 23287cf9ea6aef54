//! The Cryo interpreter (spec §4.4, §4.5): loads a `.crye` executable and
//! runs it to completion on a single [`Thread`].
//!
//! Boundary function grounded on spec §1's external interface list:
//! `run(executable_path, args) -> exit_code`.

pub mod fault;
pub mod intrinsics;
pub mod loader;
pub mod stack;
pub mod thread;

use std::path::Path;

use cryo_core::types::TypeTable;

pub use fault::Fault;
pub use intrinsics::{IntrinsicFn, IntrinsicRegistry};
pub use loader::Executable;
pub use stack::RuntimeStack;
pub use thread::{Thread, ThreadState};

/// The signature this VM looks for as a program's entry point. Not
/// specified by the wire format itself (a `.crye` image carries no
/// "entry point" declaration, spec §3) — this implementation adopts the
/// canonical signature of `fn $main @void -> @void { … }`, the shape every
/// scenario in spec §8 uses.
pub const ENTRY_SIGNATURE: &str = "$void::main::void";

/// A fatal runtime fault, distinct from the usage/compilation exit codes
/// spec §6 defines for the CLI driver (`-1`, `-2`). Not specified by the
/// core spec itself; this implementation's own choice, recorded in
/// DESIGN.md.
pub const EXIT_RUNTIME_FAULT: i32 = -3;
pub const EXIT_LOAD_ERROR: i32 = -4;
pub const EXIT_MISSING_ENTRY_POINT: i32 = -5;

/// Loads `executable_path` and runs its `$void::main::void` entry point to
/// completion. `args` are accepted for parity with the external interface
/// spec §1 describes but are not wired into any VM-visible ABI — this
/// instruction set has no parameter type capable of carrying a string
/// array, and no argv-passing convention is defined (an intrinsic could
/// read them in a richer build, but none is defined here).
pub fn run(executable_path: impl AsRef<Path>, args: &[String]) -> i32 {
    #[cfg(feature = "tracing")]
    if !args.is_empty() {
        tracing::debug!(count = args.len(), "command-line arguments are not forwarded to the VM (no argv ABI is specified)");
    }
    #[cfg(not(feature = "tracing"))]
    let _ = args;

    let executable = match Executable::load(executable_path.as_ref()) {
        Ok(executable) => executable,
        Err(error) => {
            #[cfg(feature = "tracing")]
            tracing::error!(path = %executable_path.as_ref().display(), %error, "failed to load executable image");
            #[cfg(not(feature = "tracing"))]
            eprintln!("failed to load {}: {error}", executable_path.as_ref().display());
            return EXIT_LOAD_ERROR;
        }
    };

    let Some(entry) = executable.function_index_by_signature(ENTRY_SIGNATURE) else {
        eprintln!("no entry point: executable defines no '{ENTRY_SIGNATURE}' function");
        return EXIT_MISSING_ENTRY_POINT;
    };

    let intrinsics = IntrinsicRegistry::with_builtins();
    let type_table = TypeTable::new();
    let mut thread = Thread::new(&executable, &intrinsics, &type_table);

    match thread.execute(entry) {
        Ok(()) => 0,
        Err(fault) => {
            eprintln!("{}: {fault}", thread.current_function_signature());
            EXIT_RUNTIME_FAULT
        }
    }
}
