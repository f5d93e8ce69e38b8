use std::io::Read;

use wingline_core::{Record, RecordIter, WinglineError};

use super::FormatWriter;
use crate::container::ContainerWriter;

/// Length-prefixed (msgpack's own framing) records, back-to-back with no
/// extra delimiter; used for the intermediate cache (`spec.md` §4.5,
/// "Msgpack").
pub fn open_reader(mut container_stream: Box<dyn Read + Send>) -> Result<RecordIter, WinglineError> {
    let iter = std::iter::from_fn(move || {
        match rmp_serde::decode::from_read::<_, Record>(&mut container_stream) {
            Ok(record) => Some(Ok(record)),
            Err(rmp_serde::decode::Error::InvalidMarkerRead(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                None
            }
            Err(e) => Some(Err(WinglineError::Serialization(format!(
                "msgpack decode error: {e}"
            )))),
        }
    });
    Ok(Box::new(iter))
}

pub struct MsgpackWriter {
    writer: Box<dyn ContainerWriter>,
}

impl MsgpackWriter {
    pub fn new(writer: Box<dyn ContainerWriter>) -> Self {
        MsgpackWriter { writer }
    }
}

impl FormatWriter for MsgpackWriter {
    fn write_record(&mut self, record: &Record) -> Result<(), WinglineError> {
        rmp_serde::encode::write(&mut self.writer, record)
            .map_err(|e| WinglineError::Serialization(format!("msgpack encode error: {e}")))
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn ContainerWriter>, WinglineError> {
        Ok(self.writer)
    }
}
