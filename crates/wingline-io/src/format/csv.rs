use std::io::Read;

use wingline_core::{Record, RecordIter, Value, WinglineError};

use super::FormatWriter;
use crate::container::ContainerWriter;

fn csv_err(e: ::csv::Error) -> WinglineError {
    WinglineError::Serialization(format!("csv error: {e}"))
}

/// RFC 4180-ish "excel" dialect. The reader yields records keyed by the
/// header row; the writer emits a header on the first record using that
/// record's key order, then reuses it for every subsequent row
/// (`spec.md` §4.5, "CSV").
pub fn open_reader(container_stream: Box<dyn Read + Send>) -> Result<RecordIter, WinglineError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(container_stream);
    let headers = reader.headers().map_err(csv_err)?.clone();

    let iter = reader.into_records().map(move |result| {
        let row = result.map_err(csv_err)?;
        let mut record = Record::with_capacity(headers.len());
        for (key, value) in headers.iter().zip(row.iter()) {
            record.insert(key.to_string(), Value::Str(value.to_string()));
        }
        Ok(record)
    });
    Ok(Box::new(iter))
}

pub struct CsvWriter {
    writer: ::csv::Writer<Box<dyn ContainerWriter>>,
    header: Option<Vec<String>>,
}

impl CsvWriter {
    pub fn new(writer: Box<dyn ContainerWriter>) -> Self {
        CsvWriter {
            writer: ::csv::WriterBuilder::new().from_writer(writer),
            header: None,
        }
    }
}

impl FormatWriter for CsvWriter {
    fn write_record(&mut self, record: &Record) -> Result<(), WinglineError> {
        let header = match &self.header {
            Some(header) => header,
            None => {
                let header: Vec<String> = record.keys().cloned().collect();
                self.writer.write_record(&header).map_err(csv_err)?;
                self.header = Some(header);
                self.header.as_ref().unwrap()
            }
        };

        let mut row = Vec::with_capacity(header.len());
        for key in header {
            let value = record.get(key).ok_or_else(|| {
                WinglineError::Serialization(format!("csv record missing column `{key}`"))
            })?;
            let scalar = value.to_scalar_string().ok_or_else(|| {
                WinglineError::Serialization(format!(
                    "csv cannot encode a non-scalar value for column `{key}`"
                ))
            })?;
            row.push(scalar);
        }
        self.writer.write_record(&row).map_err(csv_err)
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn ContainerWriter>, WinglineError> {
        self.writer
            .into_inner()
            .map_err(|e| WinglineError::Serialization(format!("csv finish failed: {e}")))
    }
}
