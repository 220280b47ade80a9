//! Round-trip tests between the writer and the reader.
//!
//! The writer's output must always be accepted by the reader, and a
//! parse → rewrite → parse cycle must reproduce the same event payloads and
//! summary.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tap_format::TapWriter;
use tap_parse::{Directive, Event, Reader, Summary, TestPoint};

fn parse(input: &str) -> (Vec<Event>, Summary, bool) {
    let mut reader = Reader::new(input.as_bytes());
    let mut events = Vec::new();
    while let Some(event) = reader.next_event().expect("in-memory read") {
        events.push(event);
    }
    let summary = reader.summary().expect("in-memory read");
    let clean = reader
        .diagnostics()
        .expect("in-memory read")
        .iter()
        .all(|d| !d.is_error());
    (events, summary, clean)
}

/// Event payloads with the positional fields (line, raw) stripped, for
/// comparing a document against its rewrite.
#[derive(Debug, PartialEq)]
enum Shape {
    Version,
    Plan(usize, String),
    Point(TestPoint),
    Yaml(BTreeMap<String, String>),
    Comment(String),
    Bail(String),
}

fn shapes(events: &[Event]) -> Vec<Shape> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Version { .. } => Some(Shape::Version),
            Event::Plan { plan, .. } => Some(Shape::Plan(plan.count, plan.reason.clone())),
            Event::TestPoint { point, .. } => Some(Shape::Point(point.clone())),
            Event::YamlDiagnostic { entries, .. } => Some(Shape::Yaml(entries.clone())),
            Event::Comment { text, .. } => Some(Shape::Comment(text.clone())),
            Event::BailOut { reason, .. } => Some(Shape::Bail(reason.clone())),
            _ => None,
        })
        .collect()
}

/// Re-emit a flat event stream through the writer. YAML diagnostics attach
/// to the failing test point they follow.
fn rewrite(events: &[Event]) -> String {
    let mut out = Vec::new();
    {
        let mut writer = TapWriter::new(&mut out).expect("write header");
        let mut i = 0;
        while i < events.len() {
            match &events[i] {
                Event::Version { .. } => {}
                Event::Plan { plan, .. } => writer.plan_ahead(plan.count).expect("plan"),
                Event::TestPoint { point, .. } => match point.directive {
                    Directive::Skip => {
                        writer
                            .skip(&point.description, &point.reason)
                            .expect("skip");
                    }
                    Directive::Todo => {
                        writer
                            .todo(&point.description, &point.reason)
                            .expect("todo");
                    }
                    Directive::None if point.ok => {
                        writer.ok(&point.description).expect("ok");
                    }
                    Directive::None => {
                        let entries = match events.get(i + 1) {
                            Some(Event::YamlDiagnostic { entries, .. }) => {
                                i += 1;
                                Some(entries)
                            }
                            _ => None,
                        };
                        writer.not_ok(&point.description, entries).expect("not ok");
                    }
                },
                Event::Comment { text, .. } => writer.comment(text).expect("comment"),
                Event::BailOut { reason, .. } => writer.bail_out(reason).expect("bail out"),
                _ => {}
            }
            i += 1;
        }
    }
    String::from_utf8(out).expect("utf-8 output")
}

fn assert_fixpoint(input: &str) {
    let (events, summary, clean) = parse(input);
    assert!(clean, "fixpoint corpus must parse clean: {input:?}");

    let rewritten = rewrite(&events);
    let (reparsed, resummary, reclean) = parse(&rewritten);

    assert!(reclean, "rewrite must parse clean: {rewritten:?}");
    assert_eq!(shapes(&events), shapes(&reparsed), "input: {input:?}");
    assert_eq!(summary, resummary, "input: {input:?}");
}

#[test]
fn fixpoint_minimal() {
    assert_fixpoint("TAP version 14\n1..2\nok 1 - first\nok 2 - second\n");
}

#[test]
fn fixpoint_trailing_plan() {
    assert_fixpoint("TAP version 14\nok 1 - a\nok 2 - b\n1..2\n");
}

#[test]
fn fixpoint_directives() {
    assert_fixpoint(
        "TAP version 14\n1..3\nok 1 - solid\nok 2 - lazy # SKIP io missing\nnot ok 3 - wip # TODO finish\n",
    );
}

#[test]
fn fixpoint_yaml_diagnostics() {
    assert_fixpoint(
        "TAP version 14\n1..1\nnot ok 1 - fail\n  ---\n  message: broken\n  severity: fail\n  ...\n",
    );
}

#[test]
fn fixpoint_multiline_yaml_value() {
    assert_fixpoint(
        "TAP version 14\n1..1\nnot ok 1 - fail\n  ---\n  output: |\n    line one\n    line two\n  ...\n",
    );
}

#[test]
fn fixpoint_comments_and_bail_out() {
    assert_fixpoint("TAP version 14\n1..3\n# warming up\nok 1 - a\nBail out! db down\n");
}

#[test]
fn fixpoint_escaped_description() {
    assert_fixpoint("TAP version 14\n1..1\nok 1 - weird \\# case \\\\ here\n");
}

#[test]
fn yaml_keys_sorted_after_round_trip() {
    let input =
        "TAP version 14\n1..1\nnot ok 1 - fail\n  ---\n  zebra: last\n  alpha: first\n  ...\n";
    let (events, _, clean) = parse(input);
    assert!(clean);

    let rewritten = rewrite(&events);
    let alpha = rewritten.find("alpha:").expect("alpha key");
    let zebra = rewritten.find("zebra:").expect("zebra key");
    assert!(alpha < zebra, "{rewritten}");

    let (reparsed, _, reclean) = parse(&rewritten);
    assert!(reclean);
    assert_eq!(shapes(&events), shapes(&reparsed));
}

#[test]
fn writer_subtest_output_is_accepted() {
    let mut out = Vec::new();
    let mut writer = TapWriter::new(&mut out).expect("write header");
    {
        let mut child = writer.subtest("inner suite").expect("subtest");
        child.ok("one").expect("ok");
        child.not_ok("two", None).expect("not ok");
        child.plan().expect("plan");
    }
    writer.not_ok("inner suite", None).expect("outer not ok");
    writer.plan().expect("outer plan");

    let text = String::from_utf8(out).expect("utf-8 output");
    let (_, summary, clean) = parse(&text);
    assert!(clean, "{text}");
    assert!(summary.valid);
    assert_eq!(summary.total_tests, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.passed, 1);
}

#[test]
fn writer_yaml_block_in_subtest_is_accepted() {
    let block: BTreeMap<String, String> = [
        ("message".to_string(), "boom".to_string()),
        ("trace".to_string(), "a\nb\nc".to_string()),
    ]
    .into_iter()
    .collect();

    let mut out = Vec::new();
    let mut writer = TapWriter::new(&mut out).expect("write header");
    {
        let mut child = writer.subtest("crashy").expect("subtest");
        child.not_ok("explodes", Some(&block)).expect("not ok");
        child.plan().expect("plan");
    }
    writer.not_ok("crashy", None).expect("outer not ok");
    writer.plan().expect("outer plan");

    let text = String::from_utf8(out).expect("utf-8 output");
    let (events, _, clean) = parse(&text);
    assert!(clean, "{text}");

    let entries = events
        .iter()
        .find_map(|event| match event {
            Event::YamlDiagnostic { entries, .. } => Some(entries),
            _ => None,
        })
        .expect("yaml diagnostic event");
    assert_eq!(entries.get("message").map(String::as_str), Some("boom"));
    assert_eq!(entries.get("trace").map(String::as_str), Some("a\nb\nc"));
}

fn description() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9#\\\\ ]{1,20}".prop_filter("descriptions are stored trimmed", |d| d.trim() == d)
}

fn reason() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,12}".prop_filter("reasons are stored trimmed", |r| r.trim() == r)
}

#[derive(Debug, Clone)]
enum Op {
    Ok(String),
    NotOk(String),
    Skip(String, String),
    Todo(String, String),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        description().prop_map(Op::Ok),
        description().prop_map(Op::NotOk),
        (description(), reason()).prop_map(|(d, r)| Op::Skip(d, r)),
        (description(), reason()).prop_map(|(d, r)| Op::Todo(d, r)),
    ]
}

proptest! {
    /// Whatever the writer emits, the reader accepts without errors and
    /// tallies exactly as written.
    #[test]
    fn writer_output_always_parses_clean(ops in proptest::collection::vec(op(), 0..12)) {
        let mut out = Vec::new();
        let mut writer = TapWriter::new(&mut out).expect("write header");
        let (mut passed, mut failed, mut skipped, mut todo) = (0usize, 0usize, 0usize, 0usize);
        for op in &ops {
            match op {
                Op::Ok(d) => {
                    writer.ok(d).expect("ok");
                    passed += 1;
                }
                Op::NotOk(d) => {
                    writer.not_ok(d, None).expect("not ok");
                    failed += 1;
                }
                Op::Skip(d, r) => {
                    writer.skip(d, r).expect("skip");
                    skipped += 1;
                }
                Op::Todo(d, r) => {
                    writer.todo(d, r).expect("todo");
                    todo += 1;
                }
            }
        }
        writer.plan().expect("plan");

        let text = String::from_utf8(out).expect("utf-8 output");
        let (_, summary, clean) = parse(&text);
        prop_assert!(clean, "{}", text);
        prop_assert!(summary.valid);
        prop_assert_eq!(summary.total_tests, ops.len());
        prop_assert_eq!(summary.passed, passed);
        prop_assert_eq!(summary.failed, failed);
        prop_assert_eq!(summary.skipped, skipped);
        prop_assert_eq!(summary.todo, todo);
    }

    /// Descriptions with `#` and `\` survive the write/parse cycle.
    #[test]
    fn description_escape_round_trip(description in description()) {
        let mut out = Vec::new();
        let mut writer = TapWriter::new(&mut out).expect("write header");
        writer.ok(&description).expect("ok");
        writer.plan().expect("plan");

        let text = String::from_utf8(out).expect("utf-8 output");
        let (events, _, clean) = parse(&text);
        prop_assert!(clean, "{}", text);

        let point = events
            .iter()
            .find_map(|event| match event {
                Event::TestPoint { point, .. } => Some(point),
                _ => None,
            })
            .expect("test point event");
        prop_assert_eq!(&point.description, &description);
    }
}
