//! Wingline: assemble and execute record-processing pipelines over
//! line-delimited structured data.
//!
//! This crate is the public surface — a fluent builder over
//! `wingline-core`'s graph/scheduler and `wingline-io`'s concrete
//! taps/sinks/cache, the same boundary the teacher draws around its
//! `-tx` crate.

pub mod pipeline;

pub use pipeline::{Pipeline, Source};
pub use wingline_core::{NodeId, Record, StageHash, Value, WinglineError};
pub use wingline_io::sink::PipelineIter;
