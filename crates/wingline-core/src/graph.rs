//! The plumbing graph: nodes are stages, edges are queues.
//!
//! See `spec.md` §3 ("Graph") and §4.1. `Graph` owns every node, builds
//! the queues between them as they're added, runs the two-pass
//! activation algorithm, and drives the scheduler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::error::WinglineError;
use crate::hash::StageHash;
use crate::node::{self, NodeRuntime, Stage};
use crate::queue::{self, QueueReceiver, QueueSender};

/// Opaque identifier for a node within one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What role a node plays, which only matters for two things: whether
/// it's a candidate root/sink for [`Graph::taps`]/[`Graph::sinks`], and
/// the cache-reader activation short-circuit in `activate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Tap,
    Pipe,
    Sink,
    CacheReader,
    CacheWriter,
}

struct NodeEntry {
    label: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    hash: Option<StageHash>,
    active: bool,
    stage: Option<Box<dyn Stage>>,
    inbound: Option<QueueReceiver>,
    outbound: Vec<QueueSender>,
}

/// The default bound on every queue edge. Small enough to apply real
/// backpressure, large enough that a fast producer doesn't thrash on
/// every single record.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A DAG of stages connected by bounded queues.
///
/// Nodes become immutable once [`Graph::run`] has been called once;
/// calling `run` (or `add_node`) again after that fails with
/// [`WinglineError::AlreadyStarted`].
pub struct Graph {
    nodes: IndexMap<NodeId, NodeEntry>,
    next_id: usize,
    roots: Vec<NodeId>,
    sinks: Vec<NodeId>,
    started: AtomicBool,
    abort: CancellationToken,
    channel_capacity: usize,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_channel_capacity(channel_capacity: usize) -> Self {
        Graph {
            nodes: IndexMap::new(),
            next_id: 0,
            roots: Vec::new(),
            sinks: Vec::new(),
            started: AtomicBool::new(false),
            abort: CancellationToken::new(),
            channel_capacity,
        }
    }

    /// True once [`Graph::run`] has been called, successfully or not.
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Insert a node with the given parent (`None` for a root tap),
    /// recomputing activation afterward (`spec.md` §4.1, "add_node").
    ///
    /// A queue edge is created immediately between `parent` and this node
    /// if a parent is given — queues are created at node construction,
    /// not at `run` time (`spec.md` §3, "Lifecycles").
    pub fn add_node(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        label: impl Into<String>,
        hash: Option<StageHash>,
        stage: Box<dyn Stage>,
    ) -> Result<NodeId, WinglineError> {
        if self.started() {
            return Err(WinglineError::AlreadyStarted);
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;

        let inbound = if let Some(parent_id) = parent {
            let (tx, rx) = queue::bounded(self.channel_capacity);
            self.nodes
                .get_mut(&parent_id)
                .expect("parent id was returned by add_node on this graph")
                .outbound
                .push(tx);
            self.nodes
                .get_mut(&parent_id)
                .expect("parent id was returned by add_node on this graph")
                .children
                .push(id);
            Some(rx)
        } else {
            self.roots.push(id);
            None
        };

        self.nodes.insert(
            id,
            NodeEntry {
                label: label.into(),
                kind,
                parent,
                children: Vec::new(),
                hash,
                active: false,
                stage: Some(stage),
                inbound,
                outbound: Vec::new(),
            },
        );

        if kind == NodeKind::Sink {
            self.sinks.push(id);
        }

        self.activate();
        Ok(id)
    }

    pub fn hash_of(&self, id: NodeId) -> Option<StageHash> {
        self.nodes.get(&id).and_then(|n| n.hash)
    }

    pub fn taps(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots.iter().copied()
    }

    pub fn sinks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.sinks.iter().copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Two-pass activation (`spec.md` §4.1 / §9 "Graph activation"):
    /// mark every ancestor of every sink active, then for every
    /// cache-reader, deactivate its ancestors — the data behind that
    /// reader is cached, so recomputing it would be wasted work.
    fn activate(&mut self) {
        for node in self.nodes.values_mut() {
            node.active = false;
        }

        let sinks = self.sinks.clone();
        for sink in sinks {
            self.mark_active(sink);
        }

        let cache_readers: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.kind == NodeKind::CacheReader)
            .map(|(id, _)| *id)
            .collect();
        for reader in cache_readers {
            // The reader itself must stay active (it supplies the data);
            // only its ancestors are short-circuited.
            if let Some(parent) = self.nodes[&reader].parent {
                self.mark_inactive_ancestors(parent);
            }
        }
    }

    fn mark_active(&mut self, id: NodeId) {
        let (already_active, parent) = {
            let node = &self.nodes[&id];
            (node.active, node.parent)
        };
        self.nodes.get_mut(&id).unwrap().active = true;
        if !already_active {
            if let Some(parent) = parent {
                self.mark_active(parent);
            }
        }
    }

    fn mark_inactive_ancestors(&mut self, id: NodeId) {
        let parent = {
            let node = self.nodes.get_mut(&id).unwrap();
            node.active = false;
            node.parent
        };
        if let Some(parent) = parent {
            self.mark_inactive_ancestors(parent);
        }
    }

    pub fn is_active(&self, id: NodeId) -> bool {
        self.nodes.get(&id).map(|n| n.active).unwrap_or(false)
    }

    /// A nested mapping suitable for pretty rendering (`spec.md` §4.1,
    /// "dict()"): each node's label mapped to its active children.
    pub fn dict(&self) -> HashMap<String, serde_json::Value> {
        fn build(graph: &Graph, id: NodeId) -> serde_json::Value {
            let node = &graph.nodes[&id];
            let children: serde_json::Map<String, serde_json::Value> = node
                .children
                .iter()
                .filter(|c| graph.nodes[c].active)
                .map(|c| (graph.nodes[c].label.clone(), build(graph, *c)))
                .collect();
            serde_json::json!({
                "kind": format!("{:?}", node.kind),
                "active": node.active,
                "hash": node.hash.map(|h| h.to_string()),
                "children": children,
            })
        }

        self.roots
            .iter()
            .filter(|r| self.nodes[r].active)
            .map(|r| (self.nodes[r].label.clone(), build(self, *r)))
            .collect()
    }

    /// Run every active node to completion (or to first error).
    ///
    /// Starts a worker thread per active node, joins them all, and
    /// returns the first captured `StageFailure`-class error, if any.
    /// Fails immediately with `AlreadyStarted` if called twice
    /// (`spec.md` §4.1, "run()").
    pub fn run(&mut self) -> Result<(), WinglineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(WinglineError::AlreadyStarted);
        }

        let first_error: Arc<Mutex<Option<WinglineError>>> = Arc::new(Mutex::new(None));
        let mut handles = Vec::new();

        let active_ids: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| self.nodes[id].active)
            .collect();

        for id in active_ids {
            let entry = self.nodes.get_mut(&id).unwrap();
            let runtime = NodeRuntime {
                label: entry.label.clone(),
                stage: entry
                    .stage
                    .take()
                    .expect("each active node is started exactly once"),
                inbound: entry.inbound.take(),
                outbound: std::mem::take(&mut entry.outbound),
                abort: self.abort.clone(),
            };
            handles.push(node::spawn_node(runtime, first_error.clone()));
        }

        for handle in handles {
            let _ = handle.join();
        }

        match first_error.lock().expect("mutex poisoned").take() {
            Some(err) => Err(err),
            None if self.abort.is_cancelled() => Err(WinglineError::StageFailure {
                stage: "graph".into(),
                source: anyhow::anyhow!("aborted with no captured cause"),
            }),
            None => Ok(()),
        }
    }

    /// The shared cancellation token every node checks at queue waits and
    /// record boundaries (`spec.md` §5, "Shared resources").
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, Value};
    use crate::RecordIter;

    struct ConstTap(Vec<Record>);
    impl Stage for ConstTap {
        fn name(&self) -> &str {
            "const-tap"
        }
        fn process(&mut self, _input: RecordIter) -> RecordIter {
            let items: Vec<_> = self.0.drain(..).map(Ok).collect();
            Box::new(items.into_iter())
        }
    }

    struct CollectSink(Arc<Mutex<Vec<Record>>>);
    impl Stage for CollectSink {
        fn name(&self) -> &str {
            "collect-sink"
        }
        fn process(&mut self, input: RecordIter) -> RecordIter {
            let collected = self.0.clone();
            let mut out = Vec::new();
            for item in input {
                if let Ok(record) = item {
                    collected.lock().unwrap().push(record.clone());
                    out.push(Ok(record));
                }
            }
            Box::new(out.into_iter())
        }
    }

    fn rec(n: i64) -> Record {
        let mut r = Record::new();
        r.insert("n", Value::Int(n));
        r
    }

    #[test]
    fn linear_graph_delivers_every_record_in_order() {
        let mut graph = Graph::new();
        let source = vec![rec(1), rec(2), rec(3)];
        let tap = graph
            .add_node(None, NodeKind::Tap, "tap", None, Box::new(ConstTap(source)))
            .unwrap();

        let collected = Arc::new(Mutex::new(Vec::new()));
        graph
            .add_node(
                Some(tap),
                NodeKind::Sink,
                "sink",
                None,
                Box::new(CollectSink(collected.clone())),
            )
            .unwrap();

        graph.run().unwrap();

        let got = collected.lock().unwrap().clone();
        assert_eq!(got, vec![rec(1), rec(2), rec(3)]);
    }

    #[test]
    fn run_twice_fails_with_already_started() {
        let mut graph = Graph::new();
        graph
            .add_node(None, NodeKind::Tap, "tap", None, Box::new(ConstTap(vec![])))
            .unwrap();
        graph.run().unwrap();
        let err = graph.run().unwrap_err();
        assert!(matches!(err, WinglineError::AlreadyStarted));
    }

    #[test]
    fn cache_reader_deactivates_its_ancestor_chain() {
        let mut graph = Graph::new();
        let tap = graph
            .add_node(None, NodeKind::Tap, "tap", None, Box::new(ConstTap(vec![rec(1)])))
            .unwrap();
        let reader = graph
            .add_node(
                Some(tap),
                NodeKind::CacheReader,
                "cache-reader",
                None,
                Box::new(ConstTap(vec![rec(1)])),
            )
            .unwrap();
        graph
            .add_node(
                Some(reader),
                NodeKind::Sink,
                "sink",
                None,
                Box::new(CollectSink(Arc::new(Mutex::new(Vec::new())))),
            )
            .unwrap();

        assert!(!graph.is_active(tap));
        assert!(graph.is_active(reader));
    }
}
