//! Adapts a user-supplied closure, in either of the two shapes
//! `spec.md` §4.2 allows, into a `Stage`.

use wingline_core::node::{RecordIter, Stage};

/// `(iterator<Record>) -> iterator<Record>`: consumes and produces a
/// full record stream, used for windowed stages like `head`/`tail`.
pub trait AllProcess: FnMut(RecordIter) -> RecordIter + Send + 'static {}
impl<F> AllProcess for F where F: FnMut(RecordIter) -> RecordIter + Send + 'static {}

/// `(Record) -> Option<Record>`: one record in, zero or one out.
pub trait EachProcess: FnMut(wingline_core::Record) -> Option<wingline_core::Record> + Send + 'static
{
}
impl<F> EachProcess for F where
    F: FnMut(wingline_core::Record) -> Option<wingline_core::Record> + Send + 'static
{
}

/// A user-supplied all-process closure, already in `Stage::process`'s
/// native shape; `process` is called exactly once per node lifetime, so
/// the closure only needs to live behind an `Option` to be moved out.
pub struct AllStage<F> {
    label: String,
    process: Option<F>,
}

impl<F: AllProcess> AllStage<F> {
    pub fn new(label: impl Into<String>, process: F) -> Self {
        AllStage {
            label: label.into(),
            process: Some(process),
        }
    }
}

impl<F: AllProcess> Stage for AllStage<F> {
    fn name(&self) -> &str {
        &self.label
    }

    fn process(&mut self, input: RecordIter) -> RecordIter {
        let mut process = self.process.take().expect("process is called exactly once");
        process(input)
    }
}

/// Wraps an each-process closure into the all-process shape via a lazy
/// `filter_map`, so records keep streaming through one at a time rather
/// than buffering the whole input (`spec.md` §4.2, "wrapped to become
/// an all-process").
pub struct EachAsAll<F> {
    label: String,
    process: Option<F>,
}

impl<F: EachProcess> EachAsAll<F> {
    pub fn new(label: impl Into<String>, process: F) -> Self {
        EachAsAll {
            label: label.into(),
            process: Some(process),
        }
    }
}

impl<F: EachProcess> Stage for EachAsAll<F> {
    fn name(&self) -> &str {
        &self.label
    }

    fn process(&mut self, input: RecordIter) -> RecordIter {
        let mut process = self.process.take().expect("process is called exactly once");
        let iter = input.filter_map(move |item| match item {
            Ok(record) => process(record).map(Ok),
            Err(err) => Some(Err(err)),
        });
        Box::new(iter)
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
    fn each_as_all_drops_filtered_records_and_preserves_order() {
        let mut stage = EachAsAll::new("double-evens", |record: Record| {
            let n = match record.get("n") {
                Some(Value::Int(n)) => *n,
                _ => return None,
            };
            if n % 2 == 0 {
                let mut out = Record::new();
                out.insert("n", Value::Int(n * 2));
                Some(out)
            } else {
                None
            }
        });

        let input: RecordIter = Box::new(vec![rec(1), rec(2), rec(3), rec(4)].into_iter().map(Ok));
        let out: Vec<Record> = stage.process(input).collect::<Result<_, _>>().unwrap();
        assert_eq!(out, vec![rec(4), rec(8)]);
    }
}
