//! Owns a `.crya` source buffer so tokens can borrow slices of it for the
//! lifetime of a tokenize/assemble pass, rather than each token holding its
//! own owned copy of its text.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    pub fn read(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        Ok(Self { path, text })
    }

    pub fn in_memory(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self { path: path.into(), text: text.into() }
    }

    /// Locates a `&str` slice borrowed from [`Self::text`] and returns its
    /// 1-indexed line number and the full text of that line, for rendering
    /// a [`crate::Diagnostic`].
    pub fn locate(&self, token_text: &str) -> (u32, &str) {
        let base = self.text.as_ptr() as usize;
        let token_ptr = token_text.as_ptr() as usize;
        debug_assert!(
            token_ptr >= base && token_ptr <= base + self.text.len(),
            "token_text must be a slice of this SourceFile's buffer"
        );
        let offset = token_ptr - base;

        let line = 1 + self.text[..offset].bytes().filter(|b| *b == b'\n').count() as u32;

        let line_start = self.text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = self.text[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(self.text.len());

        (line, &self.text[line_start..line_end])
    }
}

impl AsRef<Path> for SourceFile {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}
