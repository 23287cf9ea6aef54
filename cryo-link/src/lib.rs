//! The Cryo linker: merges `.cryi` objects into one `.crye` executable
//! (spec §4.3), unifying string-literal tables and relocating every
//! `StringIndex` operand to its place in the unified table.

pub mod linker;

use std::path::Path;

use cryo_core::ErrorQueue;

/// Links `object_paths` into a single executable at `out_path`. Mirrors
/// `cryo_asm::assemble`'s contract: returns whatever diagnostics accumulated,
/// and only writes `out_path` if none of them reached `error` severity.
pub fn link(object_paths: &[impl AsRef<Path>], out_path: impl AsRef<Path>) -> ErrorQueue {
    linker::link(object_paths, out_path)
}
