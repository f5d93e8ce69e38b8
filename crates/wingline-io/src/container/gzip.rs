use std::fs::File;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use wingline_core::WinglineError;

use super::ContainerWriter;

pub fn open_read(file: File) -> Result<Box<dyn Read + Send>, WinglineError> {
    Ok(Box::new(GzDecoder::new(file)))
}

pub fn open_write(file: File) -> Result<Box<dyn ContainerWriter>, WinglineError> {
    Ok(Box::new(GzipWriter(GzEncoder::new(file, Compression::default()))))
}

struct GzipWriter(GzEncoder<File>);

impl Write for GzipWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl ContainerWriter for GzipWriter {
    fn finish(self: Box<Self>) -> Result<(), WinglineError> {
        self.0.finish()?;
        Ok(())
    }
}
