//! Concrete file I/O for Wingline: the container x format matrix,
//! filetype detection, scoped reader/writer handles, in-memory and
//! file taps/sinks, and the content-addressed intermediate cache.
//!
//! `wingline-core` knows nothing about files, gzip, CSV, or caching;
//! this crate is where those decisions live, the same split the teacher
//! draws between `rde-core` (traits/types) and `rde-io` (concrete
//! sources/sinks).

pub mod cache;
pub mod container;
pub mod detect;
pub mod format;
pub mod reader;
pub mod sink;
pub mod tap;
pub mod writer;

pub use detect::{detect_filetype, Filetype};
pub use reader::Reader;
pub use writer::Writer;
