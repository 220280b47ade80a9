//! Aggregate results for a fully-consumed TAP stream.

use crate::event::{Directive, TestPoint};

/// Running pass/fail/skip/todo tallies across all depths.
///
/// The directive decides the bucket: a skipped or todo test never counts as
/// passed or failed, regardless of its `ok` flag.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
}

impl Tally {
    pub(crate) fn record(&mut self, point: &TestPoint) {
        match point.directive {
            Directive::Skip => self.skipped += 1,
            Directive::Todo => self.todo += 1,
            Directive::None => {
                if point.ok {
                    self.passed += 1;
                } else {
                    self.failed += 1;
                }
            }
        }
    }
}

/// Aggregate results after parsing a TAP document.
///
/// `total_tests` and `plan_count` refer to the root scope; the pass/fail
/// tallies include subtest test points.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Summary {
    pub version: u32,
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
    pub bailed_out: bool,
    pub plan_count: usize,
    /// True iff no error-severity diagnostic was recorded.
    pub valid: bool,
}
