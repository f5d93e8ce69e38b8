//! A no-op pass-through stage.
//!
//! `wingline::Pipeline::attach` concatenates onto an existing node
//! directly rather than inserting a dedicated junction node, so this
//! isn't used for that — it's a plain building block for a stage that
//! intentionally does nothing (a placeholder while wiring up a graph,
//! or a test fixture).

use wingline_core::node::{RecordIter, Stage};

pub struct Identity {
    label: String,
}

impl Identity {
    pub fn new(label: impl Into<String>) -> Self {
        Identity { label: label.into() }
    }
}

impl Stage for Identity {
    fn name(&self) -> &str {
        &self.label
    }

    fn process(&mut self, input: RecordIter) -> RecordIter {
        input
    }
}
