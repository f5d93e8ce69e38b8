//! # Wingline Core
//!
//! Foundational types for Wingline record-processing pipelines: the
//! dynamically-typed [`Record`], the content-hash [`StageHash`] that
//! drives the intermediate cache, the bounded [`queue`] abstraction
//! stages communicate over, the [`Stage`](node::Stage) trait every
//! node in the plumbing graph implements, and the [`Graph`](graph::Graph)
//! itself together with its activation algorithm and scheduler.
//!
//! Nothing in this crate knows about files, containers, or record
//! formats — that lives in `wingline-io`. This crate only knows how to
//! run a DAG of stages to completion.

pub mod error;
pub mod graph;
pub mod hash;
pub mod node;
pub mod queue;
pub mod record;

pub use error::WinglineError;
pub use graph::{Graph, NodeId, NodeKind};
pub use hash::StageHash;
pub use node::{RecordIter, Stage};
pub use queue::QueueItem;
pub use record::{Record, Value};

/// Re-exported so downstream crates don't need their own `tokio-util` dependency
/// just to build a [`Graph`] or reason about cancellation.
pub use tokio_util::sync::CancellationToken;
