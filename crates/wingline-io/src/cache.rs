//! The content-addressed intermediate cache (`spec.md` §4.6). A cache
//! entry is just another file, read and written through the same
//! container/format machinery as any other file — Gzip+Msgpack, fixed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use wingline_core::node::{RecordIter, Stage};
use wingline_core::{StageHash, WinglineError};

use crate::container::Container;
use crate::detect::Filetype;
use crate::format::Format;
use crate::reader::Reader;
use crate::writer::Writer;

const CACHE_FILETYPE: Filetype = Filetype {
    container: Container::Gzip,
    format: Format::Msgpack,
};

/// `<cache_dir>/<hash[0:2]>/<hash>.wingline` (`spec.md` §6, "On-disk
/// cache layout").
pub fn cache_path(cache_dir: &Path, hash: &StageHash) -> PathBuf {
    cache_dir.join(hash.prefix()).join(format!("{hash}.wingline"))
}

/// A tap-like node that ignores its conceptual parent and replays a
/// previously written cache file. Its ancestors are deactivated during
/// graph activation (`spec.md` §4.6, step 2).
pub struct CacheReader {
    cache_path: PathBuf,
}

impl CacheReader {
    pub fn new(cache_path: PathBuf) -> Self {
        CacheReader { cache_path }
    }
}

impl Stage for CacheReader {
    fn name(&self) -> &str {
        "cache-reader"
    }

    fn process(&mut self, _input: RecordIter) -> RecordIter {
        match Reader::open(&self.cache_path, Some(CACHE_FILETYPE)) {
            Ok(reader) => Box::new(reader),
            Err(err) => Box::new(std::iter::once(Err(err))),
        }
    }
}

/// A pass-through stage that forwards every record it sees while also
/// appending it to a new cache file, atomically committed on success
/// (`spec.md` §4.6, step 3).
pub struct CacheWriter {
    cache_path: PathBuf,
    writer: Arc<Mutex<Option<Writer>>>,
}

impl CacheWriter {
    pub fn new(cache_path: PathBuf) -> Self {
        CacheWriter {
            cache_path,
            writer: Arc::new(Mutex::new(None)),
        }
    }
}

impl Stage for CacheWriter {
    fn name(&self) -> &str {
        "cache-writer"
    }

    fn setup(&mut self) -> Result<(), WinglineError> {
        let writer = Writer::open(&self.cache_path, Some(CACHE_FILETYPE))?;
        *self.writer.lock().expect("writer mutex poisoned") = Some(writer);
        Ok(())
    }

    fn process(&mut self, input: RecordIter) -> RecordIter {
        let writer = self.writer.clone();
        let iter = input.map(move |item| {
            let record = item?;
            let mut guard = writer.lock().expect("writer mutex poisoned");
            guard
                .as_mut()
                .expect("setup runs before process")
                .write(&record)?;
            Ok(record)
        });
        Box::new(iter)
    }

    fn teardown(&mut self, success: bool) -> Result<(), WinglineError> {
        let writer = self.writer.lock().expect("writer mutex poisoned").take();
        if let Some(writer) = writer {
            writer.close(success)?;
        }
        Ok(())
    }
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
    fn writer_then_reader_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc123.wingline");

        let mut writer = CacheWriter::new(path.clone());
        writer.setup().unwrap();
        let out: Vec<_> = writer
            .process(Box::new(vec![rec(1), rec(2)].into_iter().map(Ok)))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out, vec![rec(1), rec(2)]);
        writer.teardown(true).unwrap();

        assert!(path.exists());

        let mut reader = CacheReader::new(path);
        let got: Vec<_> = reader
            .process(Box::new(std::iter::empty()))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(got, vec![rec(1), rec(2)]);
    }

    #[test]
    fn failed_write_leaves_no_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc123.wingline");

        let mut writer = CacheWriter::new(path.clone());
        writer.setup().unwrap();
        let _: Vec<_> = writer
            .process(Box::new(vec![rec(1)].into_iter().map(Ok)))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        writer.teardown(false).unwrap();

        assert!(!path.exists());
    }
}
