use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use wingline_core::WinglineError;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use super::ContainerWriter;

/// Treats the zip as holding one logical member: reads the first
/// non-directory entry in full (`spec.md` §4.5, "read the first
/// non-directory entry").
pub fn open_read(file: File) -> Result<Box<dyn Read + Send>, WinglineError> {
    let mut archive = ZipArchive::new(file)
        .map_err(|e| WinglineError::Serialization(format!("bad zip archive: {e}")))?;

    let index = (0..archive.len())
        .find(|&i| {
            archive
                .by_index(i)
                .map(|entry| !entry.is_dir())
                .unwrap_or(false)
        })
        .ok_or_else(|| WinglineError::Serialization("zip archive has no file entries".into()))?;

    let mut entry = archive
        .by_index(index)
        .map_err(|e| WinglineError::Serialization(format!("bad zip entry: {e}")))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;

    Ok(Box::new(Cursor::new(buf)))
}

/// Writes by creating a single member named after `member_name`'s file
/// stem (`spec.md` §4.5, "write by creating a single member named after
/// the path stem").
pub fn open_write(
    file: File,
    member_name: &Path,
) -> Result<Box<dyn ContainerWriter>, WinglineError> {
    let stem = member_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());

    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    writer
        .start_file(stem, options)
        .map_err(|e| WinglineError::Serialization(format!("zip start_file failed: {e}")))?;

    Ok(Box::new(ZipContainerWriter(writer)))
}

struct ZipContainerWriter(ZipWriter<File>);

impl Write for ZipContainerWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl ContainerWriter for ZipContainerWriter {
    fn finish(mut self: Box<Self>) -> Result<(), WinglineError> {
        self.0
            .finish()
            .map_err(|e| WinglineError::Serialization(format!("zip finish failed: {e}")))?;
        Ok(())
    }
}
