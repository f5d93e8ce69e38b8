//! Byte-level framing: the container half of the container x format
//! matrix (`spec.md` §4.5).

mod bare;
mod gzip;
mod zip;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use wingline_core::WinglineError;

/// Which byte-level framing wraps a record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Bare,
    Gzip,
    Zip,
}

impl Container {
    pub fn suffix_match(suffix: &str) -> Option<Container> {
        match suffix {
            "gz" | "gzip" => Some(Container::Gzip),
            "zip" => Some(Container::Zip),
            _ => None,
        }
    }
}

/// A container's writing half additionally needs an explicit `finish`
/// so a zip archive's central directory gets written before the
/// underlying file is handed back for the atomic rename.
pub trait ContainerWriter: Write + Send {
    fn finish(self: Box<Self>) -> Result<(), WinglineError>;
}

/// Open `file` for reading through `container`, yielding the logical
/// byte stream a format reader consumes.
pub fn open_read(
    container: Container,
    file: File,
) -> Result<Box<dyn Read + Send>, WinglineError> {
    match container {
        Container::Bare => bare::open_read(file),
        Container::Gzip => gzip::open_read(file),
        Container::Zip => zip::open_read(file),
    }
}

/// Open `file` for writing through `container`. `member_name` is used
/// only by `Zip`, which names its single logical member after the
/// destination path's stem.
pub fn open_write(
    container: Container,
    file: File,
    member_name: &Path,
) -> Result<Box<dyn ContainerWriter>, WinglineError> {
    match container {
        Container::Bare => bare::open_write(file),
        Container::Gzip => gzip::open_write(file),
        Container::Zip => zip::open_write(file, member_name),
    }
}
