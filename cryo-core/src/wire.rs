//! Binary object/executable layout: header, a counted NUL-padded string
//! table, function declarations, code — each block closed by the
//! `0xFFFF_FFFF` sentinel. One writer and one set of reader helpers serve
//! both `.cryi` (assembler output / linker input) and `.crye` (linker
//! output / VM input), since the two formats differ only in their header
//! bytes. All multi-byte fields are little-endian.
//!
//! The string table opens with a `u32` entry count ahead of the
//! NUL-terminated blob; an interned empty string (`""`) otherwise has no
//! way to be told apart from the trailing alignment padding once the
//! table is split on NUL.
//!
//! A small byte-cursor reader/writer pair, the same idiom used anywhere a
//! flat binary stream needs sequential little-endian word access without
//! pulling in a full serde-style framework.

use std::io;

use crate::opcode::BLOCK_END;

pub const OBJECT_HEADER: &[u8; 8] = b"CRYOINT\0";
pub const EXECUTABLE_HEADER: &[u8; 8] = b"CRYOEXE\0";

/// Images smaller than this cannot hold a header plus an empty string
/// table and code block; reject them before touching the cursor.
pub const MIN_IMAGE_SIZE: usize = 12;

pub fn validate_header(bytes: &[u8], expected: &[u8; 8]) -> io::Result<()> {
    if bytes.len() < MIN_IMAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("image is {} bytes, below the {MIN_IMAGE_SIZE}-byte minimum", bytes.len()),
        ));
    }
    if &bytes[..8] != expected {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "header mismatch"));
    }
    Ok(())
}

#[inline]
pub fn read_u32_le(bytes: &[u8], byte_offset: usize) -> io::Result<u32> {
    let slice = bytes
        .get(byte_offset..byte_offset + 4)
        .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

#[inline]
pub fn round_up_to_word(n: usize) -> usize {
    (n + 3) / 4 * 4
}

/// Reads the string table starting at byte offset `start`: a leading
/// `u32` entry count, then that many NUL-terminated UTF-8 strings,
/// NUL-padded to a word boundary, then the terminating `BLOCK_END` word.
/// Returns the interned strings in wire order (their position in the Vec
/// is their wire index) and the byte offset immediately after the
/// sentinel.
///
/// The entry count is load-bearing: without it, an interned empty string
/// (`""`) is byte-for-byte indistinguishable from the trailing alignment
/// padding, and splitting the blob on NUL alone would silently drop it,
/// shifting every later index. Reading exactly `count` chunks off the
/// split iterator — rather than filtering empty chunks — keeps an empty
/// entry and the padding that follows it apart.
pub fn read_string_table(bytes: &[u8], start: usize) -> io::Result<(Vec<String>, usize)> {
    let count = read_u32_le(bytes, start)? as usize;
    let mut word_offset = start + 4;
    loop {
        let word = read_u32_le(bytes, word_offset)?;
        word_offset += 4;
        if word == BLOCK_END {
            break;
        }
    }

    let region = &bytes[start + 4..word_offset - 4];
    let mut chunks = region.split(|b| *b == 0);
    let mut strings = Vec::with_capacity(count);
    for _ in 0..count {
        let chunk = chunks
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "string table entry count exceeds its blob"))?;
        let s = std::str::from_utf8(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "string table is not valid UTF-8"))?;
        strings.push(s.to_string());
    }
    Ok((strings, word_offset))
}

/// Incrementally builds an object/executable byte buffer, supporting
/// two-pass back-patch serialization (`instruction_start_word_index` is a
/// placeholder until the code block's offsets are known).
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_header(&mut self, header: &[u8; 8]) {
        self.buf.extend_from_slice(header);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_block_end(&mut self) {
        self.write_u32(BLOCK_END);
    }

    /// Writes a `u32` entry count, then `strings` as NUL-terminated UTF-8,
    /// pads to a word boundary, then closes the block with the sentinel.
    /// The count lets the reader tell an interned empty string apart from
    /// alignment padding (see [`read_string_table`]).
    pub fn write_string_table<'a>(&mut self, strings: impl IntoIterator<Item = &'a str>) {
        let strings: Vec<&str> = strings.into_iter().collect();
        self.write_u32(strings.len() as u32);
        let start = self.buf.len();
        for s in &strings {
            self.buf.extend_from_slice(s.as_bytes());
            self.buf.push(0);
        }
        let written = self.buf.len() - start;
        self.buf.resize(start + round_up_to_word(written), 0);
        self.write_block_end();
    }

    /// Current length in bytes.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Current length in 4-byte words — the unit function offsets and
    /// indices are expressed in throughout the wire format.
    pub fn word_index(&self) -> usize {
        self.buf.len() / 4
    }

    pub fn patch_u32(&mut self, byte_offset: usize, value: u32) {
        self.buf[byte_offset..byte_offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_table_round_trips() {
        let mut writer = ByteWriter::new();
        writer.write_string_table(["foo", "bar", "baz"]);
        let bytes = writer.into_bytes();
        let (strings, next) = read_string_table(&bytes, 0).unwrap();
        assert_eq!(strings, vec!["foo", "bar", "baz"]);
        assert_eq!(next, bytes.len());
    }

    #[test]
    fn string_table_pads_to_word_boundary() {
        let mut writer = ByteWriter::new();
        writer.write_string_table(["a"]); // count(4) + "a\0"(2, padded to 4) + sentinel(4)
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn an_interned_empty_string_round_trips_without_being_mistaken_for_padding() {
        let mut writer = ByteWriter::new();
        writer.write_string_table(["", "a", ""]);
        let bytes = writer.into_bytes();
        let (strings, next) = read_string_table(&bytes, 0).unwrap();
        assert_eq!(strings, vec!["".to_string(), "a".to_string(), "".to_string()]);
        assert_eq!(next, bytes.len());
    }

    #[test]
    fn header_validation_rejects_mismatch_and_short_images() {
        assert!(validate_header(b"CRYOINT\0\0\0\0\0", OBJECT_HEADER).is_ok());
        assert!(validate_header(b"CRYOEXE\0\0\0\0\0", OBJECT_HEADER).is_err());
        assert!(validate_header(b"short", OBJECT_HEADER).is_err());
    }

    #[test]
    fn patch_u32_overwrites_a_placeholder() {
        let mut writer = ByteWriter::new();
        let at = writer.position();
        writer.write_u32(0);
        writer.patch_u32(at, 0xDEAD_BEEF);
        assert_eq!(read_u32_le(&writer.into_bytes(), at).unwrap(), 0xDEAD_BEEF);
    }
}
