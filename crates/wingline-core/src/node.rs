//! The stage (node) runtime: the worker loop every graph node executes.
//!
//! See `spec.md` §4.2. Every node — tap, pipe, sink, cache reader/writer
//! alike — implements [`Stage`] and is driven by the same loop in
//! [`run_node`]; what differs between a tap and a pipe is only whether
//! the node has an inbound queue to adapt into the `process` call's input
//! iterator.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::WinglineError;
use crate::queue::{QueueIter, QueueReceiver, QueueSender};
use crate::record::Record;

/// The shape every node's process step is normalized to: an owned,
/// possibly-lazy stream of fallible records. A `None`-free success path
/// yields only `Ok`; a `Stage` implementation observing a user error
/// yields `Err` and the node worker treats that as a `StageFailure`.
pub type RecordIter = Box<dyn Iterator<Item = Result<Record, WinglineError>> + Send>;

/// A node in the plumbing graph.
///
/// `setup`/`teardown` bracket the node's lifetime and may do I/O (opening
/// files, acquiring writers). `process` is called exactly once with an
/// iterator over the node's inbound queue (empty for taps, which ignore
/// it and generate their own records) and must return an iterator of the
/// records to emit; built-in "each" stages adapt a per-record closure
/// into this same shape (see `wingline-ops::each_all`).
pub trait Stage: Send {
    fn name(&self) -> &str;

    fn setup(&mut self) -> Result<(), WinglineError> {
        Ok(())
    }

    fn process(&mut self, input: RecordIter) -> RecordIter;

    fn teardown(&mut self, success: bool) -> Result<(), WinglineError> {
        Ok(())
    }
}

/// Everything a worker thread needs to own to run one node to completion,
/// extracted from the graph at spawn time so the thread closure borrows
/// nothing from `Graph`.
pub struct NodeRuntime {
    pub label: String,
    pub stage: Box<dyn Stage>,
    pub inbound: Option<QueueReceiver>,
    pub outbound: Vec<QueueSender>,
    pub abort: CancellationToken,
}

/// Run one node's full lifecycle (`spec.md` §4.2's loop) on the calling
/// thread. [`graph::Graph::run`] calls this inside a `std::thread::spawn`
/// per active node.
pub fn run_node(mut runtime: NodeRuntime, first_error: Arc<Mutex<Option<WinglineError>>>) {
    let NodeRuntime {
        label,
        mut stage,
        inbound,
        outbound,
        abort,
    } = runtime;

    if let Err(err) = stage.setup() {
        report_failure(&label, err, &abort, &first_error);
        broadcast_sentinel(&outbound);
        let _ = stage.teardown(false);
        return;
    }

    let input: RecordIter = match inbound {
        Some(rx) => Box::new(QueueIter::new(rx, abort.clone()).map(Ok)),
        None => Box::new(std::iter::empty()),
    };

    let output = stage.process(input);

    let mut success = true;
    let mut emitted = 0usize;
    for item in output {
        if abort.is_cancelled() {
            success = false;
            break;
        }
        match item {
            Ok(record) => {
                broadcast_record(&outbound, record);
                emitted += 1;
            }
            Err(err) => {
                success = false;
                report_failure(&label, err, &abort, &first_error);
                break;
            }
        }
    }

    broadcast_sentinel(&outbound);

    let success = success && !abort.is_cancelled();
    if let Err(err) = stage.teardown(success) {
        report_failure(&label, err, &abort, &first_error);
    }

    debug!(stage = %label, emitted, success, "node finished");
}

fn report_failure(
    label: &str,
    err: WinglineError,
    abort: &CancellationToken,
    first_error: &Arc<Mutex<Option<WinglineError>>>,
) {
    error!(stage = %label, error = %err, "stage failed, aborting graph");
    abort.cancel();
    let mut slot = first_error.lock().expect("first_error mutex poisoned");
    if slot.is_none() {
        *slot = Some(err);
    }
}

fn broadcast_record(outbound: &[QueueSender], record: Record) {
    match outbound.len() {
        0 => {}
        1 => {
            let _ = outbound[0].send_record(record);
        }
        n => {
            for sender in &outbound[..n - 1] {
                let _ = sender.send_record(record.clone());
            }
            let _ = outbound[n - 1].send_record(record);
        }
    }
}

fn broadcast_sentinel(outbound: &[QueueSender]) {
    for sender in outbound {
        let _ = sender.send_sentinel();
    }
}

/// Spawn [`run_node`] on its own OS thread, per `spec.md` §5 ("one OS-level
/// worker per stage"); grounded on `dozer-core`'s per-node execution thread.
pub fn spawn_node(
    runtime: NodeRuntime,
    first_error: Arc<Mutex<Option<WinglineError>>>,
) -> JoinHandle<()> {
    let label = runtime.label.clone();
    std::thread::Builder::new()
        .name(format!("wingline-{label}"))
        .spawn(move || {
            info!(stage = %label, "node starting");
            run_node(runtime, first_error);
        })
        .expect("failed to spawn node worker thread")
}
