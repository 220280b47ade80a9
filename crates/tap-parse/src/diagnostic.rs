//! Validation diagnostics and their rendering.

use std::fmt;
use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};

/// Severity of a diagnostic. Only errors affect [`crate::Summary`] validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "lowercase")
)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Stable identifier for each validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "kebab-case")
)]
pub enum Rule {
    /// First structural line is not the version.
    VersionRequired,
    /// No plan at end of input without a bail-out.
    PlanRequired,
    /// Second plan in a scope.
    PlanDuplicate,
    /// Declared plan count disagrees with the tests that ran.
    PlanCountMismatch,
    /// Test point without an explicit number.
    TestNumberMissing,
    /// Non-consecutive test number.
    TestNumberSequence,
    /// `---` not immediately after a test point.
    YamlOrphan,
    /// Wrong indentation on `---`.
    YamlIndent,
    /// `...` without an opener, or end of input inside a YAML block.
    YamlUnclosed,
    /// Version line inside a subtest.
    SubtestVersion,
}

impl Rule {
    /// The stable wire identifier for this rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::VersionRequired => "version-required",
            Rule::PlanRequired => "plan-required",
            Rule::PlanDuplicate => "plan-duplicate",
            Rule::PlanCountMismatch => "plan-count-mismatch",
            Rule::TestNumberMissing => "test-number-missing",
            Rule::TestNumberSequence => "test-number-sequence",
            Rule::YamlOrphan => "yaml-orphan",
            Rule::YamlIndent => "yaml-indent",
            Rule::YamlUnclosed => "yaml-unclosed",
            Rule::SubtestVersion => "subtest-version",
        }
    }

    /// Each rule has a fixed severity.
    pub fn severity(&self) -> Severity {
        match self {
            Rule::VersionRequired
            | Rule::PlanRequired
            | Rule::PlanDuplicate
            | Rule::PlanCountMismatch
            | Rule::YamlIndent
            | Rule::YamlUnclosed => Severity::Error,
            Rule::TestNumberMissing
            | Rule::TestNumberSequence
            | Rule::YamlOrphan
            | Rule::SubtestVersion => Severity::Warning,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation problem found in TAP input.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    /// 1-based line the problem was discovered on.
    pub line: usize,
    pub severity: Severity,
    pub rule: Rule,
    pub message: String,
    /// Byte range of the offending line in the input (empty at end of
    /// input).
    pub span: Range<usize>,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render this diagnostic with ariadne.
    ///
    /// Returns a formatted report with source context. `source` must be the
    /// same text the reader consumed.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| format!("{}", self))
    }

    /// Write the report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };
        let range = self.span.clone();
        let report = Report::build(kind, (filename, range.clone()))
            .with_code(self.rule.as_str())
            .with_message(&self.message)
            .with_label(
                Label::new((filename, range))
                    .with_message(self.rule.as_str())
                    .with_color(color),
            )
            .finish();
        let _ = report.write((filename, Source::from(source)), writer);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {}: [{}] {}",
            self.line, self.severity, self.rule, self.message
        )
    }
}
