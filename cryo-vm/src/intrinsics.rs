//! The intrinsic registry (spec §4.5, §9): a process-wide, read-only map
//! from canonical signature to host function, dispatched by `IMPL`.
//!
//! Spec §9: "Make both explicit configuration passed into … VM
//! constructors, not ambient singletons" — so this is a value threaded into
//! [`crate::thread::Thread`], not a `static`, mirroring how
//! `cryo_core::types::TypeTable` is built fresh per workspace rather than
//! shared as a global.

use fxhash::FxHashMap;

use crate::fault::Fault;
use crate::thread::Thread;

/// A host function invoked synchronously for `IMPL`. Receives the Thread
/// whose call frame has already been opened over the intrinsic's arguments
/// (spec §4.5 IMPL: "push a call frame (as for CALL_SIG), invoke the host
/// function synchronously, then pop the frame").
pub type IntrinsicFn = for<'e> fn(&mut Thread<'e>) -> Result<(), Fault>;

#[derive(Default)]
pub struct IntrinsicRegistry {
    functions: FxHashMap<String, IntrinsicFn>,
}

impl IntrinsicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry seeded with every intrinsic this VM ships (spec §4.5:
    /// "Provided intrinsic: `$void::println_str::void*`").
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("$void::println_str::void*", println_str);
        registry
    }

    pub fn register(&mut self, signature: impl Into<String>, function: IntrinsicFn) {
        self.functions.insert(signature.into(), function);
    }

    pub fn get(&self, signature: &str) -> Option<IntrinsicFn> {
        self.functions.get(signature).copied()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Prints the string whose handle sits in slot 0, followed by a newline.
/// Faults if the handle does not resolve to a live string (spec §4.5:
/// "faults if the pointer is null").
fn println_str(thread: &mut Thread<'_>) -> Result<(), Fault> {
    let handle = u64::from_le_bytes(thread.stack().read::<8>(0));
    let text = thread.resolve_string_handle(handle).ok_or(Fault::NullPointer)?;
    println!("{text}");
    Ok(())
}
