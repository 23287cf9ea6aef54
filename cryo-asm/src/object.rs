//! Writes an assembled [`cryo_core::ObjectFile`] out as a `.cryi` file,
//! using the shared layout in `cryo_core::objfile` under the object header.

use std::fs;
use std::io;
use std::path::Path;

use cryo_core::wire::OBJECT_HEADER;
use cryo_core::ObjectFile;

pub fn write_object(path: impl AsRef<Path>, object: &ObjectFile) -> io::Result<()> {
    let bytes = cryo_core::objfile::write(OBJECT_HEADER, object);
    fs::write(path, bytes)
}
