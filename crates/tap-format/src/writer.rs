//! Low-level TAP-14 output writer.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::escape::escape_description;

/// Indentation added per subtest level.
const INDENT: &str = "    ";

/// A stateful TAP-14 emitter.
///
/// Construction writes the `TAP version 14` header exactly once; the test
/// counter starts at 1 and every test-point operation returns the number it
/// used. A [`TapWriter::subtest`] child borrows the same sink and prefixes
/// every line it writes with four more spaces.
pub struct TapWriter<W: Write> {
    sink: W,
    count: usize,
    depth: usize,
}

impl<W: Write> TapWriter<W> {
    /// Create a writer and emit the version header.
    pub fn new(sink: W) -> io::Result<Self> {
        let mut writer = Self {
            sink,
            count: 0,
            depth: 0,
        };
        writer.write_line("TAP version 14")?;
        Ok(writer)
    }

    /// Number of test points emitted so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Emit a passing test point. Returns the test number used.
    pub fn ok(&mut self, description: &str) -> io::Result<usize> {
        let number = self.count + 1;
        self.write_line(&format!("ok {number} - {}", escape_description(description)))?;
        self.count = number;
        Ok(number)
    }

    /// Emit a failing test point, optionally followed by a YAML diagnostic
    /// block. Returns the test number used.
    pub fn not_ok(
        &mut self,
        description: &str,
        diagnostics: Option<&BTreeMap<String, String>>,
    ) -> io::Result<usize> {
        let number = self.count + 1;
        self.write_line(&format!(
            "not ok {number} - {}",
            escape_description(description)
        ))?;
        self.count = number;
        if let Some(diagnostics) = diagnostics {
            if !diagnostics.is_empty() {
                self.write_yaml_block(diagnostics)?;
            }
        }
        Ok(number)
    }

    /// Emit a skipped test point (`# SKIP reason`). Returns the number used.
    pub fn skip(&mut self, description: &str, reason: &str) -> io::Result<usize> {
        self.directive_line(true, description, "SKIP", reason)
    }

    /// Emit an unfinished test point (`# TODO reason`). Returns the number
    /// used.
    pub fn todo(&mut self, description: &str, reason: &str) -> io::Result<usize> {
        self.directive_line(false, description, "TODO", reason)
    }

    fn directive_line(
        &mut self,
        ok: bool,
        description: &str,
        keyword: &str,
        reason: &str,
    ) -> io::Result<usize> {
        let number = self.count + 1;
        let status = if ok { "ok" } else { "not ok" };
        let description = escape_description(description);
        let line = if reason.is_empty() {
            format!("{status} {number} - {description} # {keyword}")
        } else {
            format!("{status} {number} - {description} # {keyword} {reason}")
        };
        self.write_line(&line)?;
        self.count = number;
        Ok(number)
    }

    /// Emit a trailing plan covering every test written so far (possibly
    /// `1..0`).
    pub fn plan(&mut self) -> io::Result<()> {
        let count = self.count;
        self.write_line(&format!("1..{count}"))
    }

    /// Emit a plan up front, before the tests it announces.
    pub fn plan_ahead(&mut self, count: usize) -> io::Result<()> {
        self.write_line(&format!("1..{count}"))
    }

    /// Emit a bail-out line, aborting the run.
    pub fn bail_out(&mut self, reason: &str) -> io::Result<()> {
        if reason.is_empty() {
            self.write_line("Bail out!")
        } else {
            self.write_line(&format!("Bail out! {reason}"))
        }
    }

    /// Emit a comment line.
    pub fn comment(&mut self, text: &str) -> io::Result<()> {
        self.write_line(&format!("# {text}"))
    }

    /// Open a subtest. The child writer shares this writer's sink, indents
    /// every line one level further, announces itself with a
    /// `# Subtest: NAME` comment and does not repeat the version header.
    ///
    /// The parent is reborrowed for the child's lifetime; emit the parent's
    /// own test point for the subtest after the child is dropped.
    pub fn subtest(&mut self, name: &str) -> io::Result<TapWriter<&mut W>> {
        let mut child = TapWriter {
            sink: &mut self.sink,
            count: 0,
            depth: self.depth + 1,
        };
        child.comment(&format!("Subtest: {name}"))?;
        Ok(child)
    }

    fn write_yaml_block(&mut self, entries: &BTreeMap<String, String>) -> io::Result<()> {
        self.write_line("  ---")?;
        for (key, value) in entries {
            if value.contains('\n') {
                self.write_line(&format!("  {key}: |"))?;
                for line in value.split('\n') {
                    self.write_line(&format!("    {line}"))?;
                }
            } else {
                self.write_line(&format!("  {key}: {value}"))?;
            }
        }
        self.write_line("  ...")
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        for _ in 0..self.depth {
            self.sink.write_all(INDENT.as_bytes())?;
        }
        self.sink.write_all(line.as_bytes())?;
        self.sink.write_all(b"\n")
    }
}
