//! Source stages: no parent, no inbound queue (`spec.md` §4.3).

use std::path::PathBuf;

use wingline_core::node::{RecordIter, Stage};
use wingline_core::{hash, Record, StageHash, WinglineError};

use crate::detect::Filetype;
use crate::reader::Reader;

/// Iterates an owned in-memory sequence. Hash is stable across runs for
/// equal sequences (`spec.md` §4.3, "Sequence tap").
pub struct SequenceTap {
    records: Vec<Record>,
}

impl SequenceTap {
    pub fn new(records: Vec<Record>) -> Self {
        SequenceTap { records }
    }

    pub fn hash(&self) -> StageHash {
        hash::hash_sequence(self.records.iter())
    }
}

impl Stage for SequenceTap {
    fn name(&self) -> &str {
        "sequence-tap"
    }

    fn process(&mut self, _input: RecordIter) -> RecordIter {
        let records = std::mem::take(&mut self.records);
        Box::new(records.into_iter().map(Ok))
    }
}

/// Iterates a one-shot iterator; never hashable (`spec.md` §4.3,
/// "Iterable tap").
pub struct IterableTap {
    source: Option<Box<dyn Iterator<Item = Record> + Send>>,
}

impl IterableTap {
    pub fn new(source: impl Iterator<Item = Record> + Send + 'static) -> Self {
        IterableTap {
            source: Some(Box::new(source)),
        }
    }
}

impl Stage for IterableTap {
    fn name(&self) -> &str {
        "iterable-tap"
    }

    fn process(&mut self, _input: RecordIter) -> RecordIter {
        let source = self.source.take().expect("process is called exactly once");
        Box::new(source.map(Ok))
    }
}

/// Reads a file through the reader abstraction (`spec.md` §4.3, "File
/// tap"); hash is a streaming content hash of the raw bytes.
pub struct FileTap {
    path: PathBuf,
    filetype: Option<Filetype>,
}

impl FileTap {
    pub fn new(path: impl Into<PathBuf>, filetype: Option<Filetype>) -> Self {
        FileTap {
            path: path.into(),
            filetype,
        }
    }

    pub fn hash(&self) -> Result<StageHash, WinglineError> {
        hash::hash_file(&self.path)
    }
}

impl Stage for FileTap {
    fn name(&self) -> &str {
        "file-tap"
    }

    fn process(&mut self, _input: RecordIter) -> RecordIter {
        match Reader::open(&self.path, self.filetype) {
            Ok(reader) => Box::new(reader),
            Err(err) => Box::new(std::iter::once(Err(err))),
        }
    }
}
