//! Line classification for TAP-14 input.
//!
//! Classification is a pure function over a single line with its leading
//! spaces already removed. It only routes lines; extracting payloads is the
//! job of the [`crate::line`] parsers, which reuse the same patterns.

use std::sync::OnceLock;

use regex::Regex;

/// The kind of a single TAP line, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `TAP version 14`, exactly.
    Version,
    /// `1..N`, optionally with a `# reason` comment.
    Plan,
    /// `ok` or `not ok`, at a word boundary (`okay` is not a test point).
    TestPoint,
    /// `---`, exactly.
    YamlStart,
    /// `...`, exactly.
    YamlEnd,
    /// Starts with `Bail out!` (case-sensitive).
    BailOut,
    /// `pragma +key` or `pragma -key`.
    Pragma,
    /// Starts with `#`.
    Comment,
    /// Starts with `# Subtest`; the rest of the line is the subtest name.
    SubtestComment,
    /// Nothing but whitespace.
    Empty,
    /// Anything else, including tab-indented content.
    Unknown,
}

/// Anchored plan pattern. The leading `1` is literal; no other starting
/// test number is accepted.
pub(crate) fn plan_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^1\.\.(\d+)(\s+#\s+(.*))?$").expect("plan pattern compiles")
    })
}

fn test_point_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(not )?ok\b").expect("test point pattern compiles"))
}

fn pragma_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^pragma\s+[+-]\w").expect("pragma pattern compiles"))
}

/// Classify one raw line, stripped of its trailing newline and leading
/// spaces.
pub fn classify(line: &str) -> LineKind {
    if line == "TAP version 14" {
        return LineKind::Version;
    }
    if plan_pattern().is_match(line) {
        return LineKind::Plan;
    }
    if test_point_pattern().is_match(line) {
        return LineKind::TestPoint;
    }
    if line == "---" {
        return LineKind::YamlStart;
    }
    if line == "..." {
        return LineKind::YamlEnd;
    }
    if line.starts_with("Bail out!") {
        return LineKind::BailOut;
    }
    if pragma_pattern().is_match(line) {
        return LineKind::Pragma;
    }
    if line.starts_with("# Subtest") {
        return LineKind::SubtestComment;
    }
    if line.starts_with('#') {
        return LineKind::Comment;
    }
    if line.trim().is_empty() {
        return LineKind::Empty;
    }
    LineKind::Unknown
}
