//! Textual type name → byte size, with a fixed built-in set and room for
//! user-added types. Passed explicitly into the assembler rather than kept
//! as a process-wide singleton, so two assembler runs in the same process
//! never share type definitions by accident.

use fxhash::FxHashMap;

#[derive(Debug, Clone)]
pub struct TypeTable {
    sizes: FxHashMap<Box<str>, u32>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut sizes = FxHashMap::default();
        for (name, size) in BUILTIN_TYPES {
            sizes.insert((*name).into(), *size);
        }
        Self { sizes }
    }

    /// Returns `false` if `name` (including its leading `@` sigil) is
    /// already registered.
    pub fn add_custom_type(&mut self, name: &str, size: u32) -> bool {
        if self.sizes.contains_key(name) {
            return false;
        }
        self.sizes.insert(name.into(), size);
        true
    }

    pub fn size_of(&self, name: &str) -> Option<u32> {
        self.sizes.get(name).copied()
    }
}

const BUILTIN_TYPES: &[(&str, u32)] = &[
    ("@void", 0),
    ("@void*", 8),
    ("@uint8", 1),
    ("@uint16", 2),
    ("@uint32", 4),
    ("@uint64", 8),
    ("@int8", 1),
    ("@int16", 2),
    ("@int32", 4),
    ("@int64", 8),
    ("@float32", 4),
    ("@float64", 8),
];
