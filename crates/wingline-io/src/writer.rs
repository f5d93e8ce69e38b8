//! Scoped atomic write handle over a container + format pairing
//! (`spec.md` §4.5, "Writer contract"; §9, "Atomic writes").

use std::path::{Path, PathBuf};

use wingline_core::{Record, WinglineError};

use crate::detect::{self, Filetype};
use crate::format::FormatWriter;
use crate::{container, format};

/// Writes to a temporary sibling file and only renames it into place on
/// a successful `close`; on failure the temporary file is removed, so no
/// partial output is ever observable at the destination path.
pub struct Writer {
    dest: PathBuf,
    temp_path: PathBuf,
    format_writer: Option<Box<dyn FormatWriter>>,
}

impl Writer {
    pub fn open(path: impl AsRef<Path>, filetype: Option<Filetype>) -> Result<Self, WinglineError> {
        let dest = path.as_ref().to_path_buf();
        if dest.exists() {
            return Err(WinglineError::PathExists(dest));
        }
        let filetype = match filetype {
            Some(f) => f,
            None => detect::detect_filetype(&dest)?,
        };

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let temp_path = sibling_temp_path(&dest);
        let file = std::fs::File::create(&temp_path)?;
        let container_writer = container::open_write(filetype.container, file, &dest)?;
        let format_writer = format::open_writer(filetype.format, container_writer)?;

        Ok(Writer {
            dest,
            temp_path,
            format_writer: Some(format_writer),
        })
    }

    pub fn write(&mut self, record: &Record) -> Result<(), WinglineError> {
        self.format_writer
            .as_mut()
            .expect("write called after close")
            .write_record(record)
    }

    /// Commits the temp file to `dest` if `success`, otherwise discards
    /// it. Consumes `self` so a second `close` is a compile error, not a
    /// runtime one.
    pub fn close(mut self, success: bool) -> Result<(), WinglineError> {
        let format_writer = self.format_writer.take().expect("closed exactly once");
        let container_writer = format_writer.finish()?;
        container_writer.finish()?;

        if success {
            std::fs::rename(&self.temp_path, &self.dest)?;
        } else {
            let _ = std::fs::remove_file(&self.temp_path);
        }
        Ok(())
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        // A writer dropped without `close` (e.g. a panic unwinding through
        // it) must not leave a partial file sitting at `dest`; the temp
        // file was never renamed, so only best-effort cleanup is needed.
        if self.format_writer.is_some() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

fn sibling_temp_path(dest: &Path) -> PathBuf {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wingline-out".to_string());
    dest.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wingline_core::{Record, Value};

    fn rec(n: i64) -> Record {
        let mut r = Record::new();
        r.insert("n", Value::Int(n));
        r
    }

    #[test]
    fn success_renames_temp_into_place_and_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.jl");

        let mut writer = Writer::open(&dest, None).unwrap();
        writer.write(&rec(1)).unwrap();
        writer.close(true).unwrap();

        assert!(dest.exists());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn failure_leaves_no_file_at_dest_or_temp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.jl");

        let mut writer = Writer::open(&dest, None).unwrap();
        writer.write(&rec(1)).unwrap();
        writer.close(false).unwrap();

        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn opening_against_an_existing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.jl");
        std::fs::write(&dest, b"already here").unwrap();

        let err = Writer::open(&dest, None).unwrap_err();
        assert!(matches!(err, WinglineError::PathExists(_)));
    }
}
