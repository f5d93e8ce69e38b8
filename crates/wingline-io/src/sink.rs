//! Terminal stages (`spec.md` §4.4). Both sinks forward every record to
//! their outbound queues after finalizing it, so a writer sink can
//! still have children ("sinks with children" open question, resolved
//! **yes** — see `DESIGN.md`).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};
use wingline_core::node::{RecordIter, Stage};
use wingline_core::{Record, WinglineError};

use crate::detect::Filetype;
use crate::writer::Writer;

/// Exposes an external blocking iterator fed by the sink's worker
/// thread. A `Pipeline` is responsible for only ever handing out one
/// [`PipelineIter`] per graph (`spec.md` §4.4, "re-iteration fails with
/// `AlreadyStarted`").
pub struct IteratorSink {
    tx: Sender<Option<Record>>,
}

impl IteratorSink {
    pub fn new() -> (Self, PipelineIter) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (IteratorSink { tx }, PipelineIter { rx })
    }
}

impl Stage for IteratorSink {
    fn name(&self) -> &str {
        "iterator-sink"
    }

    fn process(&mut self, input: RecordIter) -> RecordIter {
        let tx = self.tx.clone();
        let iter = input.map(move |item| {
            if let Ok(record) = &item {
                let _ = tx.send(Some(record.clone()));
            }
            item
        });
        Box::new(iter)
    }

    fn teardown(&mut self, _success: bool) -> Result<(), WinglineError> {
        let _ = self.tx.send(None);
        Ok(())
    }
}

/// The consumer-facing half of [`IteratorSink`]; implemented as an
/// unbounded channel, per `spec.md` §9's "Iterator sink" design note.
pub struct PipelineIter {
    rx: Receiver<Option<Record>>,
}

impl Iterator for PipelineIter {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rx.recv() {
            Ok(Some(record)) => Some(record),
            Ok(None) | Err(_) => None,
        }
    }
}

/// Writes records via the writer abstraction, acquiring the writer in
/// `setup` and releasing it in `teardown` (`spec.md` §4.4, "File writer
/// sink"). The writer only commits to its final path when the node
/// tears down with `success = true`.
pub struct FileWriterSink {
    path: PathBuf,
    filetype: Option<Filetype>,
    writer: Arc<Mutex<Option<Writer>>>,
}

impl FileWriterSink {
    pub fn new(path: impl Into<PathBuf>, filetype: Option<Filetype>) -> Self {
        FileWriterSink {
            path: path.into(),
            filetype,
            writer: Arc::new(Mutex::new(None)),
        }
    }
}

impl Stage for FileWriterSink {
    fn name(&self) -> &str {
        "file-writer-sink"
    }

    fn setup(&mut self) -> Result<(), WinglineError> {
        let writer = Writer::open(&self.path, self.filetype)?;
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
