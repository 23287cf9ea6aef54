//! `cryo.toml`: the file whose presence marks a workspace root (spec §6,
//! "Environment / persisted state"). Its contents are out of the core
//! spec's scope; this shape is this driver's own minimal choice, recorded
//! in DESIGN.md.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CryoToml {
    pub project: Project,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
}

impl CryoToml {
    pub fn new(name: impl Into<String>) -> Self {
        Self { project: Project { name: name.into() } }
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("CryoToml serializes without error")
    }
}

/// Walks up from `start` looking for the nearest ancestor containing
/// `cryo.toml` (spec §6: `build`/`run` "locate the nearest ancestor
/// containing cryo.toml").
pub fn find_workspace(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join("cryo.toml").is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

pub fn read(workspace: &Path) -> io::Result<CryoToml> {
    let text = fs::read_to_string(workspace.join("cryo.toml"))?;
    toml::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
