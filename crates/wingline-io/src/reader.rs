//! Scoped read handle over a container + format pairing (`spec.md`
//! §4.5, "Reader contract").

use std::path::{Path, PathBuf};

use wingline_core::{RecordIter, Record, WinglineError};

use crate::detect::{self, Filetype};
use crate::{container, format};

/// `Reader::open` acquires the container handle then the format reader;
/// dropping a `Reader` drops the format reader first (it owns the
/// container stream as a field), closing format then container.
pub struct Reader {
    pub path: PathBuf,
    pub filetype: Filetype,
    iter: RecordIter,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>, filetype: Option<Filetype>) -> Result<Self, WinglineError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(WinglineError::NonexistentSource(path));
        }
        let filetype = match filetype {
            Some(f) => f,
            None => detect::detect_filetype(&path)?,
        };

        let file = std::fs::File::open(&path)?;
        let container_stream = container::open_read(filetype.container, file)?;
        let iter = format::open_reader(filetype.format, container_stream)?;

        Ok(Reader { path, filetype, iter })
    }
}

impl Iterator for Reader {
    type Item = Result<Record, WinglineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}
