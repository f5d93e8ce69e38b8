//! Windowed built-in stages.
//!
//! Both always fully drain their input before yielding, even once
//! they've already seen enough records to answer — `head(2)` does not
//! stop reading after its second record. Short-circuiting would leave
//! the upstream worker blocked forever on a full bounded queue once this
//! stage stops pulling (`spec.md` §5's "bounded blocking put"), so the
//! window is built by a single full pass over the input iterator.

use std::collections::VecDeque;

use wingline_core::node::{RecordIter, Stage};
use wingline_core::Record;

pub struct Head {
    n: usize,
}

impl Head {
    pub fn new(n: usize) -> Self {
        Head { n }
    }
}

impl Stage for Head {
    fn name(&self) -> &str {
        "head"
    }

    fn process(&mut self, input: RecordIter) -> RecordIter {
        let n = self.n;
        let mut kept: Vec<Record> = Vec::with_capacity(n);
        let mut first_err = None;

        for item in input {
            match item {
                Ok(record) if kept.len() < n => kept.push(record),
                Ok(_) => {}
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }

        match first_err {
            Some(err) => Box::new(kept.into_iter().map(Ok).chain(std::iter::once(Err(err)))),
            None => Box::new(kept.into_iter().map(Ok)),
        }
    }
}

pub struct Tail {
    n: usize,
}

impl Tail {
    pub fn new(n: usize) -> Self {
        Tail { n }
    }
}

impl Stage for Tail {
    fn name(&self) -> &str {
        "tail"
    }

    fn process(&mut self, input: RecordIter) -> RecordIter {
        let n = self.n;
        let mut window: VecDeque<Record> = VecDeque::with_capacity(n);
        let mut first_err = None;

        for item in input {
            match item {
                Ok(record) => {
                    if window.len() == n {
                        window.pop_front();
                    }
                    if n > 0 {
                        window.push_back(record);
                    }
                }
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }

        match first_err {
            Some(err) => Box::new(
                window
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(err))),
            ),
            None => Box::new(window.into_iter().map(Ok)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wingline_core::Value;

    fn rec(x: i64) -> Record {
        let mut r = Record::new();
        r.insert("x", Value::Int(x));
        r
    }

    #[test]
    fn head_keeps_first_n_in_order() {
        let input: RecordIter = Box::new((1..=5).map(rec).map(Ok));
        let out: Vec<Record> = Head::new(2).process(input).collect::<Result<_, _>>().unwrap();
        assert_eq!(out, vec![rec(1), rec(2)]);
    }

    #[test]
    fn tail_keeps_last_n_in_order() {
        let input: RecordIter = Box::new((1..=5).map(rec).map(Ok));
        let out: Vec<Record> = Tail::new(2).process(input).collect::<Result<_, _>>().unwrap();
        assert_eq!(out, vec![rec(4), rec(5)]);
    }

    #[test]
    fn head_larger_than_input_keeps_everything() {
        let input: RecordIter = Box::new((1..=3).map(rec).map(Ok));
        let out: Vec<Record> = Head::new(10).process(input).collect::<Result<_, _>>().unwrap();
        assert_eq!(out, vec![rec(1), rec(2), rec(3)]);
    }
}
