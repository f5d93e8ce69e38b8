use std::fs::File;
use std::io::{Read, Write};

use wingline_core::WinglineError;

use super::ContainerWriter;

pub fn open_read(file: File) -> Result<Box<dyn Read + Send>, WinglineError> {
    Ok(Box::new(file))
}

pub fn open_write(file: File) -> Result<Box<dyn ContainerWriter>, WinglineError> {
    Ok(Box::new(BareWriter(file)))
}

struct BareWriter(File);

impl Write for BareWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl ContainerWriter for BareWriter {
    fn finish(mut self: Box<Self>) -> Result<(), WinglineError> {
        self.0.flush()?;
        Ok(())
    }
}
