//! The fluent builder: compose a graph, place cache read/write pairs,
//! run it (`spec.md` §4.7).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use wingline_core::graph::{Graph, NodeId, NodeKind};
use wingline_core::hash::hash_stage_id;
use wingline_core::node::Stage;
use wingline_core::{Record, StageHash, WinglineError};
use wingline_io::cache::{self, CacheReader, CacheWriter};
use wingline_io::detect::Filetype;
use wingline_io::sink::{FileWriterSink, IteratorSink, PipelineIter};
use wingline_io::tap::{FileTap, IterableTap, SequenceTap};
use wingline_ops::each_all::{AllProcess, EachProcess};
use wingline_ops::{AllStage, EachAsAll, Head, Tail};

/// Where a pipeline's records originate. `Pipeline::new` accepts
/// anything convertible into one of these.
pub enum Source {
    Sequence(Vec<Record>),
    Iterable(Box<dyn Iterator<Item = Record> + Send>),
    File(PathBuf, Option<Filetype>),
}

impl From<Vec<Record>> for Source {
    fn from(records: Vec<Record>) -> Self {
        Source::Sequence(records)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::File(path, None)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::File(path.to_path_buf(), None)
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::File(PathBuf::from(path), None)
    }
}

impl Source {
    /// An explicit constructor for the one-shot-iterator tap, since a
    /// blanket `From<impl Iterator<...>>` would be ambiguous against the
    /// concrete conversions above.
    pub fn from_iterable(iter: impl Iterator<Item = Record> + Send + 'static) -> Self {
        Source::Iterable(Box::new(iter))
    }
}

/// The public entry point: wraps a `wingline_core::Graph` under
/// construction, tracking the current tail node and its content hash so
/// each appended stage can compose `hash(parent_hash ∥ hash(stage_id))`
/// and, when `cache_dir` is set, splice in a cache reader or writer.
///
/// The graph is shared behind `Arc<Mutex<_>>` rather than owned outright,
/// so that [`Pipeline::attach`] can build a second chain from an earlier
/// node of the same graph (a tee) while this `Pipeline` keeps building its
/// own chain independently.
pub struct Pipeline {
    graph: Arc<Mutex<Graph>>,
    cache_dir: Option<PathBuf>,
    last_node: NodeId,
    last_hash: Option<StageHash>,
}

impl Pipeline {
    pub fn new(source: impl Into<Source>, cache_dir: Option<PathBuf>) -> Result<Self, WinglineError> {
        let (stage, hash): (Box<dyn Stage>, Option<StageHash>) = match source.into() {
            Source::Sequence(records) => {
                let tap = SequenceTap::new(records);
                let hash = Some(tap.hash());
                (Box::new(tap), hash)
            }
            Source::Iterable(iter) => (Box::new(IterableTap::new(iter)), None),
            Source::File(path, filetype) => {
                if !path.exists() {
                    return Err(WinglineError::NonexistentSource(path));
                }
                let tap = FileTap::new(path, filetype);
                let hash = Some(tap.hash()?);
                (Box::new(tap), hash)
            }
        };

        let mut graph = Graph::new();
        let node = graph.add_node(None, NodeKind::Tap, "tap", hash, stage)?;

        // Caching wraps stages the user adds (`spec.md` §4.6, "when a
        // user adds a stage"), not the source itself — the tap is the
        // ground truth a cache entry would otherwise just duplicate.
        Ok(Pipeline {
            graph: Arc::new(Mutex::new(graph)),
            cache_dir,
            last_node: node,
            last_hash: hash,
        })
    }

    /// Start a new builder chain attached to an earlier node of an
    /// already-built pipeline, named explicitly via `at` (`spec.md` §4.7,
    /// "concatenating one pipeline onto another requires naming the
    /// attachment node explicitly"). The two chains share the same
    /// underlying graph, so records reaching `at` flow to both — a tee.
    ///
    /// `at` must come from `source.checkpoint()` (or another node of
    /// `source`'s own graph); there is deliberately no default, so a
    /// caller can't concatenate without naming the attachment point.
    pub fn attach(source: &Pipeline, at: NodeId) -> Self {
        let last_hash = source.graph.lock().expect("graph mutex poisoned").hash_of(at);
        Pipeline {
            graph: Arc::clone(&source.graph),
            cache_dir: source.cache_dir.clone(),
            last_node: at,
            last_hash,
        }
    }

    /// The current tail node, to be captured and named explicitly when
    /// attaching a new chain later via [`Pipeline::attach`].
    pub fn checkpoint(&self) -> NodeId {
        self.last_node
    }

    /// Append an all-process stage: `(iterator<Record>) -> iterator<Record>`.
    pub fn all(mut self, stage_id: impl Into<String>, process: impl AllProcess) -> Result<Self, WinglineError> {
        let stage_id = stage_id.into();
        let stage = Box::new(AllStage::new(stage_id.clone(), process));
        self.append_stage(stage_id, stage, NodeKind::Pipe)?;
        Ok(self)
    }

    /// Append an each-process stage: `(Record) -> Option<Record>`.
    pub fn each(mut self, stage_id: impl Into<String>, process: impl EachProcess) -> Result<Self, WinglineError> {
        let stage_id = stage_id.into();
        let stage = Box::new(EachAsAll::new(stage_id.clone(), process));
        self.append_stage(stage_id, stage, NodeKind::Pipe)?;
        Ok(self)
    }

    pub fn head(mut self, n: usize) -> Result<Self, WinglineError> {
        let stage_id = format!("wingline::head({n})");
        self.append_stage(stage_id, Box::new(Head::new(n)), NodeKind::Pipe)?;
        Ok(self)
    }

    pub fn tail(mut self, n: usize) -> Result<Self, WinglineError> {
        let stage_id = format!("wingline::tail({n})");
        self.append_stage(stage_id, Box::new(Tail::new(n)), NodeKind::Pipe)?;
        Ok(self)
    }

    /// Append a file-writer sink. The container/format is auto-detected
    /// from `path`'s suffix stack unless `with_filetype` is used first.
    pub fn write(mut self, path: impl AsRef<Path>) -> Result<Self, WinglineError> {
        let path = path.as_ref().to_path_buf();
        let stage_id = format!("wingline::write({})", path.display());
        let stage = Box::new(FileWriterSink::new(path, None));
        self.append_stage(stage_id, stage, NodeKind::Sink)?;
        Ok(self)
    }

    /// Run the graph to completion, blocking until every active sink
    /// finishes or the first stage failure is observed.
    pub fn run(self) -> Result<(), WinglineError> {
        self.graph.lock().expect("graph mutex poisoned").run()
    }

    /// Add an iterator sink on the fly and start the graph in the
    /// background, returning a streaming handle over its records
    /// (`spec.md` §4.7, "Iterating a pipeline adds an iterator sink on
    /// the fly and starts the graph").
    ///
    /// A stage failure after this point is logged but not returned —
    /// the only channel back to the caller is the record stream itself,
    /// which simply ends early.
    pub fn into_iter(mut self) -> Result<PipelineIter, WinglineError> {
        let (stage, pipeline_iter) = IteratorSink::new();
        self.append_stage("wingline::into_iter".to_string(), Box::new(stage), NodeKind::Sink)?;

        let graph = self.graph;
        std::thread::spawn(move || {
            if let Err(err) = graph.lock().expect("graph mutex poisoned").run() {
                tracing::error!(error = %err, "pipeline failed while streaming to an iterator");
            }
        });

        Ok(pipeline_iter)
    }

    fn append_stage(
        &mut self,
        stage_id: String,
        stage: Box<dyn Stage>,
        kind: NodeKind,
    ) -> Result<(), WinglineError> {
        let new_hash = self
            .last_hash
            .map(|parent| StageHash::combine(&parent, &hash_stage_id(&stage_id)));
        let node = self.graph.lock().expect("graph mutex poisoned").add_node(
            Some(self.last_node),
            kind,
            stage_id.clone(),
            new_hash,
            stage,
        )?;
        self.last_node = node;
        self.last_hash = new_hash;
        self.maybe_wrap_cache(&stage_id)
    }

    /// Splices a `CacheReader`/`CacheWriter` immediately after the node
    /// just appended, when caching is configured (`spec.md` §4.6). A
    /// stage with no hash (a non-deterministic upstream — an iterable
    /// tap, or any stage descending from one) has nothing to key a
    /// cache entry on; requesting caching on top of it is a usage
    /// error, not something to silently skip (`spec.md` §7, "Cache
    /// requested for a stage with no hash").
    fn maybe_wrap_cache(&mut self, stage_id: &str) -> Result<(), WinglineError> {
        let Some(cache_dir) = self.cache_dir.clone() else {
            return Ok(());
        };
        let Some(hash) = self.last_hash else {
            return Err(WinglineError::HashUnavailable(stage_id.to_string()));
        };

        let path = cache::cache_path(&cache_dir, &hash);
        let (label, kind, stage): (&str, NodeKind, Box<dyn Stage>) = if path.exists() {
            ("cache-reader", NodeKind::CacheReader, Box::new(CacheReader::new(path)))
        } else {
            ("cache-writer", NodeKind::CacheWriter, Box::new(CacheWriter::new(path)))
        };

        let node = self
            .graph
            .lock()
            .expect("graph mutex poisoned")
            .add_node(Some(self.last_node), kind, label, Some(hash), stage)?;
        self.last_node = node;
        Ok(())
    }
}
