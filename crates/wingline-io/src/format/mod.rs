//! Record serialization: the format half of the container x format
//! matrix (`spec.md` §4.5).

mod csv;
mod jsonlines;
mod msgpack;

use std::io::Read;

use wingline_core::{Record, RecordIter, WinglineError};

use crate::container::ContainerWriter;

/// Which record serialization a container's byte stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    JsonLines,
    Csv,
    Msgpack,
}

impl Format {
    pub fn suffix_match(suffix: &str) -> Option<Format> {
        match suffix {
            "json" | "jsonl" | "jl" => Some(Format::JsonLines),
            "csv" => Some(Format::Csv),
            "msgpack" | "wingline" => Some(Format::Msgpack),
            _ => None,
        }
    }
}

/// A format's writing half, layered atop a container writer. `finish`
/// hands the container writer back so its own framing (e.g. zip's
/// central directory) can be closed afterward.
pub trait FormatWriter: Send {
    fn write_record(&mut self, record: &Record) -> Result<(), WinglineError>;
    fn finish(self: Box<Self>) -> Result<Box<dyn ContainerWriter>, WinglineError>;
}

pub fn open_reader(
    format: Format,
    container_stream: Box<dyn Read + Send>,
) -> Result<RecordIter, WinglineError> {
    match format {
        Format::JsonLines => jsonlines::open_reader(container_stream),
        Format::Csv => csv::open_reader(container_stream),
        Format::Msgpack => msgpack::open_reader(container_stream),
    }
}

pub fn open_writer(
    format: Format,
    container_writer: Box<dyn ContainerWriter>,
) -> Result<Box<dyn FormatWriter>, WinglineError> {
    match format {
        Format::JsonLines => Ok(Box::new(jsonlines::JsonLinesWriter::new(container_writer))),
        Format::Csv => Ok(Box::new(csv::CsvWriter::new(container_writer))),
        Format::Msgpack => Ok(Box::new(msgpack::MsgpackWriter::new(container_writer))),
    }
}
