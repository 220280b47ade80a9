//! Streaming TAP-14 reader: line dispatch, scope stack and validation.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::ops::Range;

use crate::classify::{classify, LineKind};
use crate::diagnostic::{Diagnostic, Rule};
use crate::event::Event;
use crate::line::{parse_bail_out, parse_plan, parse_pragma, parse_test_point};
use crate::summary::{Summary, Tally};

/// Spaces per subtest indentation level.
const INDENT_WIDTH: usize = 4;
/// Extra indentation of a YAML block relative to its scope.
const YAML_EXTRA_INDENT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Header,
    Body,
    Yaml,
    Done,
}

/// Per-scope plan state and counters.
#[derive(Debug, Clone, Default)]
struct Frame {
    depth: usize,
    plan_seen: bool,
    plan_count: usize,
    plan_line: usize,
    test_count: usize,
    last_test_number: usize,
}

/// Accumulator for one `---` .. `...` block.
#[derive(Debug)]
struct YamlBlock {
    /// Mandatory leading spaces on every block line.
    indent: usize,
    entries: BTreeMap<String, String>,
    /// Open `key: |` block scalar and its collected lines.
    block_scalar: Option<(String, Vec<String>)>,
}

impl YamlBlock {
    fn new(indent: usize) -> Self {
        Self {
            indent,
            entries: BTreeMap::new(),
            block_scalar: None,
        }
    }

    /// Feed one content line, already stripped of the block indent.
    fn feed(&mut self, content: &str) {
        if self.block_scalar.is_some() {
            if let Some(continuation) = content.strip_prefix("  ") {
                if let Some((_, lines)) = self.block_scalar.as_mut() {
                    lines.push(continuation.to_string());
                }
                return;
            }
            self.end_block_scalar();
        }
        if let Some((key, value)) = content.split_once(':') {
            let key = key.trim().to_string();
            let value = value.trim();
            if value == "|" {
                self.block_scalar = Some((key, Vec::new()));
            } else {
                self.entries.insert(key, value.to_string());
            }
        }
    }

    fn end_block_scalar(&mut self) {
        if let Some((key, lines)) = self.block_scalar.take() {
            self.entries.insert(key, lines.join("\n"));
        }
    }

    fn finish(mut self) -> BTreeMap<String, String> {
        self.end_block_scalar();
        self.entries
    }
}

/// A streaming TAP-14 parser and validator.
///
/// The reader is pull-based: each [`Reader::next_event`] call consumes input
/// up to the next complete line and returns the corresponding event.
/// Malformed input never aborts the parse; problems are recorded as
/// [`Diagnostic`]s and a best-effort event is still emitted where possible.
pub struct Reader<R> {
    input: R,
    state: State,
    /// 1-based number of the line being processed.
    line: usize,
    /// Bytes consumed from the input so far.
    consumed: usize,
    stack: Vec<Frame>,
    diagnostics: Vec<Diagnostic>,
    queue: VecDeque<Event>,
    yaml: Option<YamlBlock>,
    tally: Tally,
    bailed: bool,
    /// Set only by emitting a test point; cleared by any other line.
    after_test_point: bool,
}

impl<R: BufRead> Reader<R> {
    /// Create a new reader over the given input.
    pub fn new(input: R) -> Self {
        Self {
            input,
            state: State::Start,
            line: 0,
            consumed: 0,
            stack: vec![Frame::default()],
            diagnostics: Vec::new(),
            queue: VecDeque::new(),
            yaml: None,
            tally: Tally::default(),
            bailed: false,
            after_test_point: false,
        }
    }

    /// Pull the next event, or `None` once the input is exhausted and
    /// finalization has run.
    pub fn next_event(&mut self) -> io::Result<Option<Event>> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }
            if self.state == State::Done {
                return Ok(None);
            }

            let mut buf = String::new();
            let read = self.input.read_line(&mut buf)?;
            if read == 0 {
                self.finalize();
                continue;
            }
            self.consumed += read;
            self.line += 1;

            let raw = strip_newline(&buf);
            let start = self.consumed - read;
            let span = start..start + raw.len();
            self.process_line(raw, span);
        }
    }

    /// All diagnostics found in the input. Forces consumption to the end if
    /// the stream has not been fully read yet (discarding pending events).
    pub fn diagnostics(&mut self) -> io::Result<&[Diagnostic]> {
        self.drain()?;
        Ok(&self.diagnostics)
    }

    /// Aggregate results. Forces consumption to the end.
    pub fn summary(&mut self) -> io::Result<Summary> {
        self.drain()?;
        let root = &self.stack[0];
        Ok(Summary {
            version: 14,
            total_tests: root.test_count,
            passed: self.tally.passed,
            failed: self.tally.failed,
            skipped: self.tally.skipped,
            todo: self.tally.todo,
            bailed_out: self.bailed,
            plan_count: root.plan_count,
            valid: !self.diagnostics.iter().any(Diagnostic::is_error),
        })
    }

    /// Rebind the reader to a new source, resetting all state, and consume
    /// it to completion. Returns the bytes consumed.
    pub fn read_from(&mut self, source: R) -> io::Result<u64> {
        self.input = source;
        self.state = State::Start;
        self.line = 0;
        self.consumed = 0;
        self.stack.clear();
        self.stack.push(Frame::default());
        self.diagnostics.clear();
        self.queue.clear();
        self.yaml = None;
        self.tally = Tally::default();
        self.bailed = false;
        self.after_test_point = false;
        self.drain()?;
        Ok(self.consumed as u64)
    }

    /// Drain the input, then write a human-readable validation report: one
    /// line per diagnostic, a blank line, then the status summary. Returns
    /// the bytes written.
    pub fn write_to<W: Write>(&mut self, mut sink: W) -> io::Result<u64> {
        let summary = self.summary()?;

        let mut written = 0u64;
        for diagnostic in &self.diagnostics {
            let line = format!("{diagnostic}\n");
            sink.write_all(line.as_bytes())?;
            written += line.len() as u64;
        }

        let status = if summary.valid { "valid" } else { "invalid" };
        let line = format!(
            "\n{status}: {} tests ({} passed, {} failed, {} skipped, {} todo)\n",
            summary.total_tests, summary.passed, summary.failed, summary.skipped, summary.todo
        );
        sink.write_all(line.as_bytes())?;
        written += line.len() as u64;
        Ok(written)
    }

    fn drain(&mut self) -> io::Result<()> {
        while self.next_event()?.is_some() {}
        Ok(())
    }

    fn frame(&self) -> &Frame {
        self.stack.last().expect("scope stack holds the root frame")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("scope stack holds the root frame")
    }

    fn diag(&mut self, rule: Rule, message: impl Into<String>, span: Range<usize>) {
        self.diagnostics.push(Diagnostic {
            line: self.line,
            severity: rule.severity(),
            rule,
            message: message.into(),
            span,
        });
    }

    fn process_line(&mut self, raw: &str, span: Range<usize>) {
        if self.state == State::Yaml {
            self.process_yaml_line(raw);
            return;
        }

        let indent = raw.len() - raw.trim_start_matches(' ').len();
        let stripped = &raw[indent..];
        let depth = indent / INDENT_WIDTH;
        self.adjust_stack(depth, raw, &span);

        let kind = classify(stripped);
        trace!(line = self.line, ?kind, depth, "classified line");

        match kind {
            LineKind::Version => {
                if self.state == State::Start {
                    self.state = State::Header;
                } else if self.frame().depth > 0 {
                    self.diag(
                        Rule::SubtestVersion,
                        "subtests should omit the version line",
                        span,
                    );
                }
                self.after_test_point = false;
                self.queue.push_back(Event::Version {
                    line: self.line,
                    depth,
                    raw: raw.to_string(),
                });
            }

            LineKind::Plan => {
                if self.state == State::Start {
                    self.diag(
                        Rule::VersionRequired,
                        "first line must be TAP version 14",
                        span.clone(),
                    );
                }
                let Some(plan) = parse_plan(stripped) else {
                    // Classified as a plan but the count does not fit; keep
                    // the line visible as unknown content.
                    self.after_test_point = false;
                    self.queue.push_back(Event::Unknown {
                        line: self.line,
                        depth,
                        raw: raw.to_string(),
                    });
                    return;
                };
                if self.frame().plan_seen {
                    let first = self.frame().plan_line;
                    self.diag(
                        Rule::PlanDuplicate,
                        format!("duplicate plan line (first declared at line {first})"),
                        span,
                    );
                }
                let line = self.line;
                let frame = self.frame_mut();
                frame.plan_seen = true;
                frame.plan_count = plan.count;
                frame.plan_line = line;
                self.state = State::Body;
                self.after_test_point = false;
                self.queue.push_back(Event::Plan {
                    line: self.line,
                    depth,
                    raw: raw.to_string(),
                    plan,
                });
            }

            LineKind::TestPoint => {
                if self.state == State::Start {
                    self.diag(
                        Rule::VersionRequired,
                        "first line must be TAP version 14",
                        span.clone(),
                    );
                }
                self.state = State::Body;

                let point = parse_test_point(stripped);
                self.frame_mut().test_count += 1;
                match point.number {
                    None => self.diag(
                        Rule::TestNumberMissing,
                        "test point without an explicit number",
                        span,
                    ),
                    Some(number) => {
                        let expected = self.frame().last_test_number + 1;
                        if number != expected {
                            self.diag(
                                Rule::TestNumberSequence,
                                format!("test number {number} out of sequence, expected {expected}"),
                                span,
                            );
                        }
                        self.frame_mut().last_test_number = number;
                    }
                }
                self.tally.record(&point);
                self.after_test_point = true;
                self.queue.push_back(Event::TestPoint {
                    line: self.line,
                    depth,
                    raw: raw.to_string(),
                    point,
                });
            }

            LineKind::YamlStart => {
                if !self.after_test_point {
                    self.diag(
                        Rule::YamlOrphan,
                        "YAML block does not follow a test point",
                        span.clone(),
                    );
                }
                let expected = self.frame().depth * INDENT_WIDTH + YAML_EXTRA_INDENT;
                if indent != expected {
                    self.diag(
                        Rule::YamlIndent,
                        format!("YAML block must be indented by {expected} spaces"),
                        span,
                    );
                }
                self.state = State::Yaml;
                self.yaml = Some(YamlBlock::new(expected));
                self.after_test_point = false;
            }

            LineKind::YamlEnd => {
                self.diag(
                    Rule::YamlUnclosed,
                    "stray YAML end marker without an opening ---",
                    span,
                );
                self.after_test_point = false;
            }

            LineKind::BailOut => {
                self.bailed = true;
                self.after_test_point = false;
                self.queue.push_back(Event::BailOut {
                    line: self.line,
                    depth,
                    raw: raw.to_string(),
                    reason: parse_bail_out(stripped),
                });
            }

            LineKind::Pragma => {
                self.after_test_point = false;
                match parse_pragma(stripped) {
                    Some(pragma) => self.queue.push_back(Event::Pragma {
                        line: self.line,
                        depth,
                        raw: raw.to_string(),
                        pragma,
                    }),
                    None => self.queue.push_back(Event::Unknown {
                        line: self.line,
                        depth,
                        raw: raw.to_string(),
                    }),
                }
            }

            LineKind::Comment | LineKind::SubtestComment => {
                let text = stripped.strip_prefix('#').unwrap_or(stripped).trim();
                self.after_test_point = false;
                self.queue.push_back(Event::Comment {
                    line: self.line,
                    depth,
                    raw: raw.to_string(),
                    text: text.to_string(),
                });
            }

            LineKind::Empty => {
                self.after_test_point = false;
            }

            LineKind::Unknown => {
                self.after_test_point = false;
                self.queue.push_back(Event::Unknown {
                    line: self.line,
                    depth,
                    raw: raw.to_string(),
                });
            }
        }
    }

    /// Push or pop scope frames to match the line's depth. Nonconsecutive
    /// jumps open a nested scope directly at the deeper level; pops validate
    /// each closed frame against its plan.
    fn adjust_stack(&mut self, depth: usize, raw: &str, span: &Range<usize>) {
        if depth > self.frame().depth {
            trace!(depth, "opening subtest scope");
            self.stack.push(Frame {
                depth,
                ..Frame::default()
            });
            self.queue.push_back(Event::SubtestStart {
                line: self.line,
                depth,
                raw: raw.to_string(),
            });
        }
        while self.stack.len() > 1 && depth < self.frame().depth {
            if let Some(closed) = self.stack.pop() {
                trace!(depth = closed.depth, "closing subtest scope");
                self.queue.push_back(Event::SubtestEnd {
                    line: self.line,
                    depth: closed.depth,
                    raw: raw.to_string(),
                });
                if closed.plan_seen && closed.test_count != closed.plan_count {
                    self.diag(
                        Rule::PlanCountMismatch,
                        format!(
                            "subtest plan declared {} tests but {} ran",
                            closed.plan_count, closed.test_count
                        ),
                        span.clone(),
                    );
                }
            }
        }
    }

    fn process_yaml_line(&mut self, raw: &str) {
        let Some(block) = self.yaml.as_mut() else {
            self.state = State::Body;
            return;
        };

        let closes = raw
            .strip_suffix("...")
            .is_some_and(|prefix| prefix.len() == block.indent && prefix.bytes().all(|b| b == b' '));
        if closes {
            let entries = match self.yaml.take() {
                Some(block) => block.finish(),
                None => BTreeMap::new(),
            };
            self.state = State::Body;
            self.queue.push_back(Event::YamlDiagnostic {
                line: self.line,
                depth: self.frame().depth,
                raw: raw.to_string(),
                entries,
            });
            return;
        }

        let content = raw.get(block.indent..).unwrap_or(raw);
        block.feed(content);
    }

    /// Run end-of-input validation: close every open scope, then check the
    /// root plan. A bail-out legitimately truncates the stream, so it
    /// suppresses the root plan checks.
    fn finalize(&mut self) {
        let end = self.consumed..self.consumed;

        if self.state == State::Start {
            self.diag(
                Rule::VersionRequired,
                "first line must be TAP version 14",
                end.clone(),
            );
        }
        if self.state == State::Yaml {
            self.yaml = None;
            self.diag(
                Rule::YamlUnclosed,
                "YAML block not closed at end of input",
                end.clone(),
            );
        }

        while self.stack.len() > 1 {
            if let Some(closed) = self.stack.pop() {
                self.queue.push_back(Event::SubtestEnd {
                    line: self.line,
                    depth: closed.depth,
                    raw: String::new(),
                });
                if closed.plan_seen && closed.test_count != closed.plan_count {
                    self.diag(
                        Rule::PlanCountMismatch,
                        format!(
                            "subtest plan declared {} tests but {} ran",
                            closed.plan_count, closed.test_count
                        ),
                        end.clone(),
                    );
                }
            }
        }

        let root = &self.stack[0];
        let plan_seen = root.plan_seen;
        let plan_count = root.plan_count;
        let test_count = root.test_count;
        if !plan_seen && !self.bailed {
            self.diag(Rule::PlanRequired, "no plan line found", end.clone());
        }
        if plan_seen && test_count != plan_count && !self.bailed {
            self.diag(
                Rule::PlanCountMismatch,
                format!("plan declared {plan_count} tests but {test_count} ran"),
                end,
            );
        }

        self.state = State::Done;
    }
}

fn strip_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
