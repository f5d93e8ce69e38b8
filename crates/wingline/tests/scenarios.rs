//! End-to-end scenarios over the public `wingline` builder surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wingline::{Pipeline, Record, Value, WinglineError};
use wingline_core::node::RecordIter;

fn rec(pairs: &[(&str, i64)]) -> Record {
    let mut r = Record::new();
    for (k, v) in pairs {
        r.insert(*k, Value::Int(*v));
    }
    r
}

fn add_one(mut record: Record) -> Option<Record> {
    let mut out = Record::new();
    for (k, v) in record.clone().into_iter() {
        let Value::Int(i) = v else {
            out.insert(k, v);
            continue;
        };
        out.insert(k, Value::Int(i + 1));
    }
    std::mem::swap(&mut record, &mut out);
    Some(record)
}

/// S1 — add-one twice, in-memory, iterator sink.
#[test]
fn add_one_twice_in_memory() {
    let source = vec![
        rec(&[("a", 1), ("b", 1), ("c", 1)]),
        rec(&[("d", 1), ("e", 1), ("f", 1)]),
    ];

    let pipeline = Pipeline::new(source, None).unwrap();
    let out: Vec<Record> = pipeline
        .each("add-one-1", add_one)
        .unwrap()
        .each("add-one-2", add_one)
        .unwrap()
        .into_iter()
        .unwrap()
        .collect();

    assert_eq!(
        out,
        vec![
            rec(&[("a", 3), ("b", 3), ("c", 3)]),
            rec(&[("d", 3), ("e", 3), ("f", 3)]),
        ]
    );
}

/// S2 — head/tail windows over a five-record source.
#[test]
fn head_and_tail_windows() {
    let source: Vec<Record> = (1..=5).map(|x| rec(&[("x", x)])).collect();

    let head_out: Vec<Record> = Pipeline::new(source.clone(), None)
        .unwrap()
        .head(2)
        .unwrap()
        .into_iter()
        .unwrap()
        .collect();
    assert_eq!(head_out, vec![rec(&[("x", 1)]), rec(&[("x", 2)])]);

    let tail_out: Vec<Record> = Pipeline::new(source, None)
        .unwrap()
        .tail(2)
        .unwrap()
        .into_iter()
        .unwrap()
        .collect();
    assert_eq!(tail_out, vec![rec(&[("x", 4)]), rec(&[("x", 5)])]);
}

/// S3 — write JSONLines, read it back record-for-record.
#[test]
fn write_jsonlines_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.jl");

    let mut a = Record::new();
    a.insert("first_aired", Value::Str("1963".into()));
    a.insert("name", Value::Str("Doctor Who".into()));
    let mut b = Record::new();
    b.insert("first_aired", Value::Str("2001".into()));
    b.insert("name", Value::Str("24".into()));
    let mut c = Record::new();
    c.insert("first_aired", Value::Str("1999".into()));
    c.insert("name", Value::Str("The Sopranos".into()));
    let source = vec![a.clone(), b.clone(), c.clone()];

    Pipeline::new(source, None)
        .unwrap()
        .write(&out_path)
        .unwrap()
        .run()
        .unwrap();

    let contents = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(contents.lines().count(), 3);

    let read_back: Vec<Record> = wingline_io::Reader::open(&out_path, None)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(read_back, vec![a, b, c]);
}

/// S4 — running twice with the same cache dir must not re-invoke stages
/// whose ancestors include a cache hit.
#[test]
fn cache_hit_skips_upstream_process() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");

    let source = vec![rec(&[("x", 1)]), rec(&[("x", 2)])];
    let f_calls = Arc::new(AtomicUsize::new(0));
    let g_calls = Arc::new(AtomicUsize::new(0));

    let run = |source: Vec<Record>, f_calls: Arc<AtomicUsize>, g_calls: Arc<AtomicUsize>| {
        let f_calls2 = f_calls.clone();
        let g_calls2 = g_calls.clone();
        Pipeline::new(source, Some(cache_dir.clone()))
            .unwrap()
            .each("f", move |r: Record| {
                f_calls2.fetch_add(1, Ordering::SeqCst);
                add_one(r)
            })
            .unwrap()
            .each("g", move |r: Record| {
                g_calls2.fetch_add(1, Ordering::SeqCst);
                add_one(r)
            })
            .unwrap()
            .into_iter()
            .unwrap()
            .collect::<Vec<Record>>()
    };

    let first = run(source.clone(), f_calls.clone(), g_calls.clone());
    assert_eq!(f_calls.load(Ordering::SeqCst), 2);
    assert_eq!(g_calls.load(Ordering::SeqCst), 2);

    let mut cache_files = 0;
    for entry in walkdir(&cache_dir) {
        if entry.is_file() {
            cache_files += 1;
        }
    }
    assert_eq!(cache_files, 2, "expected one cache file per stage");

    f_calls.store(0, Ordering::SeqCst);
    g_calls.store(0, Ordering::SeqCst);
    let second = run(source, f_calls.clone(), g_calls.clone());

    assert_eq!(f_calls.load(Ordering::SeqCst), 0);
    assert_eq!(g_calls.load(Ordering::SeqCst), 0);
    assert_eq!(first, second);
}

/// Caching on top of a non-deterministic source (no content hash to key
/// a cache entry on) must raise `HashUnavailable`, not silently skip
/// caching.
#[test]
fn caching_on_iterable_source_fails_with_hash_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");

    let source = wingline::Source::from_iterable(vec![rec(&[("x", 1)])].into_iter());
    let err = Pipeline::new(source, Some(cache_dir))
        .unwrap()
        .each("f", add_one)
        .unwrap_err();

    assert!(matches!(err, WinglineError::HashUnavailable(stage) if stage == "f"));
}

/// `Pipeline::attach` concatenates a second chain onto an earlier,
/// explicitly named node of an already-built pipeline (a tee): both
/// chains observe every record that reaches the attachment point. Both
/// sinks are appended (synchronously) before either side starts the
/// graph, so a single `run()` on either handle drives both to
/// completion.
#[test]
fn attach_tees_a_second_chain_off_an_earlier_node() {
    let dir = tempfile::tempdir().unwrap();
    let main_path = dir.path().join("main.jl");
    let branch_path = dir.path().join("branch.jl");

    let source = vec![rec(&[("x", 1)]), rec(&[("x", 2)])];
    let first = Pipeline::new(source, None).unwrap().each("f", add_one).unwrap();
    let checkpoint = first.checkpoint();

    Pipeline::attach(&first, checkpoint).write(&branch_path).unwrap();
    first.write(&main_path).unwrap().run().unwrap();

    let expected = vec![rec(&[("x", 2)]), rec(&[("x", 3)])];
    let main_records: Vec<Record> = wingline_io::Reader::open(&main_path, None)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    let branch_records: Vec<Record> = wingline_io::Reader::open(&branch_path, None)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(main_records, expected);
    assert_eq!(branch_records, expected);
}

fn walkdir(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&d) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

/// S5 — a stage that raises on the first record leaves no file behind
/// at the sink's final path, nor any temp file in its directory.
#[test]
fn failing_stage_leaves_no_sink_file() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.jl");

    let source = vec![rec(&[("x", 1)]), rec(&[("x", 2)])];
    let err: RecordIter = Box::new(std::iter::once(Err(WinglineError::stage_failure(
        "raises-immediately",
        anyhow::anyhow!("boom"),
    ))));
    let mut err = Some(err);

    let result = Pipeline::new(source, None)
        .unwrap()
        .all("raises-immediately", move |_input: RecordIter| {
            err.take().expect("all() calls process exactly once")
        })
        .unwrap()
        .write(&out_path)
        .unwrap()
        .run();

    assert!(result.is_err());
    assert!(!out_path.exists());
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        let entry = entry.unwrap();
        panic!("unexpected file left behind: {:?}", entry.path());
    }
}

/// S6 — filetype detection on a gzip+jsonlines fixture, and hash
/// stability of the raw bytes across repeated reads.
#[test]
fn gzip_jsonlines_fixture_detects_and_hashes_stably() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dynamodb-tv-casts.jl.gz");

    let source: Vec<Record> = (0..85)
        .map(|i| {
            let mut r = Record::new();
            r.insert("id", Value::Int(i));
            r.insert("show", Value::Str(format!("show-{i}")));
            r
        })
        .collect();

    Pipeline::new(source, None)
        .unwrap()
        .write(&path)
        .unwrap()
        .run()
        .unwrap();

    let filetype = wingline_io::detect_filetype(&path).unwrap();
    assert_eq!(filetype.container, wingline_io::container::Container::Gzip);
    assert_eq!(filetype.format, wingline_io::format::Format::JsonLines);

    let records: Vec<Record> = wingline_io::Reader::open(&path, None)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(records.len(), 85);

    let h1 = wingline_core::hash::hash_file(&path).unwrap();
    let h2 = wingline_core::hash::hash_file(&path).unwrap();
    assert_eq!(h1, h2);
}
