//! Reader events and the payloads they carry.
//!
//! Events correspond to externally meaningful source lines, in source
//! order. Empty lines and the raw `---`/`...` markers are consumed without
//! producing an event; `SubtestStart`/`SubtestEnd` are synthetic and mark
//! the indentation-driven scope changes.

use std::collections::BTreeMap;

/// Directive attached to a test point, changing its semantic bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "lowercase")
)]
pub enum Directive {
    #[default]
    None,
    Skip,
    Todo,
}

impl Directive {
    /// The uppercase wire form; empty for `None`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::Skip => "SKIP",
            Directive::Todo => "TODO",
            Directive::None => "",
        }
    }
}

/// A parsed `ok` / `not ok` line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TestPoint {
    /// Explicit test number, if one was present.
    pub number: Option<usize>,
    /// Description with `\#` and `\\` escapes resolved, trimmed.
    pub description: String,
    pub ok: bool,
    pub directive: Directive,
    /// Text after the `SKIP`/`TODO` keyword, trimmed. Empty without a
    /// directive.
    pub reason: String,
}

/// A parsed `1..N` plan line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Plan {
    pub count: usize,
    /// Comment after `#`, trimmed. Conventionally only present on a
    /// skip-all plan (`1..0 # reason`).
    pub reason: String,
}

/// A parsed `pragma +key` / `pragma -key` line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Pragma {
    pub key: String,
    pub enabled: bool,
}

/// One parsed TAP element.
///
/// Every variant carries the 1-based source line number, the subtest depth
/// and the raw line text (indentation included, newline stripped). Synthetic
/// variants reference the line that triggered the scope change, or
/// end-of-input (empty `raw`) for frames still open there.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(tag = "type", rename_all = "kebab-case")
)]
pub enum Event {
    Version {
        line: usize,
        depth: usize,
        raw: String,
    },
    Plan {
        line: usize,
        depth: usize,
        raw: String,
        plan: Plan,
    },
    TestPoint {
        line: usize,
        depth: usize,
        raw: String,
        point: TestPoint,
    },
    /// Key/value pairs accumulated between `---` and `...`. Anchored to the
    /// closing marker's line.
    YamlDiagnostic {
        line: usize,
        depth: usize,
        raw: String,
        entries: BTreeMap<String, String>,
    },
    Comment {
        line: usize,
        depth: usize,
        raw: String,
        text: String,
    },
    BailOut {
        line: usize,
        depth: usize,
        raw: String,
        reason: String,
    },
    Pragma {
        line: usize,
        depth: usize,
        raw: String,
        pragma: Pragma,
    },
    /// A subtest scope opened (indentation increased).
    SubtestStart {
        line: usize,
        depth: usize,
        raw: String,
    },
    /// A subtest scope closed (indentation decreased or input ended).
    SubtestEnd {
        line: usize,
        depth: usize,
        raw: String,
    },
    Unknown {
        line: usize,
        depth: usize,
        raw: String,
    },
}

impl Event {
    /// 1-based source line this event is anchored to.
    pub fn line(&self) -> usize {
        match self {
            Event::Version { line, .. }
            | Event::Plan { line, .. }
            | Event::TestPoint { line, .. }
            | Event::YamlDiagnostic { line, .. }
            | Event::Comment { line, .. }
            | Event::BailOut { line, .. }
            | Event::Pragma { line, .. }
            | Event::SubtestStart { line, .. }
            | Event::SubtestEnd { line, .. }
            | Event::Unknown { line, .. } => *line,
        }
    }

    /// Subtest depth (0 for the root scope).
    pub fn depth(&self) -> usize {
        match self {
            Event::Version { depth, .. }
            | Event::Plan { depth, .. }
            | Event::TestPoint { depth, .. }
            | Event::YamlDiagnostic { depth, .. }
            | Event::Comment { depth, .. }
            | Event::BailOut { depth, .. }
            | Event::Pragma { depth, .. }
            | Event::SubtestStart { depth, .. }
            | Event::SubtestEnd { depth, .. }
            | Event::Unknown { depth, .. } => *depth,
        }
    }

    /// Raw line text, indentation included.
    pub fn raw(&self) -> &str {
        match self {
            Event::Version { raw, .. }
            | Event::Plan { raw, .. }
            | Event::TestPoint { raw, .. }
            | Event::YamlDiagnostic { raw, .. }
            | Event::Comment { raw, .. }
            | Event::BailOut { raw, .. }
            | Event::Pragma { raw, .. }
            | Event::SubtestStart { raw, .. }
            | Event::SubtestEnd { raw, .. }
            | Event::Unknown { raw, .. } => raw,
        }
    }

    /// Check if this is a test point event.
    pub fn is_test_point(&self) -> bool {
        matches!(self, Event::TestPoint { .. })
    }
}
