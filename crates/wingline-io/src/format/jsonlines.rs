use std::io::{BufRead, BufReader, Read, Write};

use wingline_core::{Record, RecordIter, WinglineError};

use super::FormatWriter;
use crate::container::ContainerWriter;

/// One JSON object per line, UTF-8, newline-terminated. The writer
/// sorts keys (`spec.md` §4.5, "JSONLines").
pub fn open_reader(container_stream: Box<dyn Read + Send>) -> Result<RecordIter, WinglineError> {
    let lines = BufReader::new(container_stream).lines();
    let iter = lines.filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(
            serde_json::from_str::<Record>(&line)
                .map_err(|e| WinglineError::Serialization(format!("bad jsonlines record: {e}"))),
        ),
        Err(e) => Some(Err(WinglineError::Io(e))),
    });
    Ok(Box::new(iter))
}

pub struct JsonLinesWriter {
    writer: Box<dyn ContainerWriter>,
}

impl JsonLinesWriter {
    pub fn new(writer: Box<dyn ContainerWriter>) -> Self {
        JsonLinesWriter { writer }
    }
}

impl FormatWriter for JsonLinesWriter {
    fn write_record(&mut self, record: &Record) -> Result<(), WinglineError> {
        let mut sorted = serde_json::Map::new();
        for key in record.sorted_keys() {
            let value = record.get(key).expect("key came from this record");
            sorted.insert(
                key.clone(),
                serde_json::to_value(value)
                    .map_err(|e| WinglineError::Serialization(format!("bad value: {e}")))?,
            );
        }
        let line = serde_json::Value::Object(sorted).to_string();
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn ContainerWriter>, WinglineError> {
        Ok(self.writer)
    }
}
