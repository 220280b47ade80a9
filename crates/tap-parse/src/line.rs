//! Line-level parsers for plan, test point, bail-out and pragma lines.
//!
//! Each parser takes a line already stripped of leading spaces and, for
//! lines the classifier matched, extracts the structured payload. They never
//! fail on classified input; the `Option` returns only guard against lines
//! that were not actually classified first.

use std::borrow::Cow;

use crate::classify::plan_pattern;
use crate::event::{Directive, Plan, Pragma, TestPoint};

/// Parse a `1..N` plan line. Returns `None` when the line does not match
/// the plan pattern or the count overflows.
pub fn parse_plan(line: &str) -> Option<Plan> {
    let captures = plan_pattern().captures(line)?;
    let count = captures.get(1)?.as_str().parse().ok()?;
    let reason = captures
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(Plan { count, reason })
}

/// Parse an `ok` / `not ok` test point line.
pub fn parse_test_point(line: &str) -> TestPoint {
    let (ok, rest) = if let Some(rest) = line.strip_prefix("not ok") {
        (false, rest)
    } else if let Some(rest) = line.strip_prefix("ok") {
        (true, rest)
    } else {
        (true, line)
    };

    let mut rest = rest.trim_start_matches(' ');

    // Optional test number: a maximal run of digits.
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let number = if digits > 0 {
        let parsed = rest[..digits].parse().ok();
        rest = &rest[digits..];
        parsed
    } else {
        None
    };

    // Optional description separator, first match.
    for separator in [" - ", "- ", " "] {
        if let Some(after) = rest.strip_prefix(separator) {
            rest = after;
            break;
        }
    }

    let (description, directive, reason) = split_directive(rest);

    TestPoint {
        number,
        description: unescape_description(description.trim()).into_owned(),
        ok,
        directive,
        reason,
    }
}

/// Split a description from its trailing directive comment. The directive
/// `#` must be unescaped, preceded by a space, and introduce `TODO` or
/// `SKIP` as the comment's first word (case-insensitive).
fn split_directive(s: &str) -> (&str, Directive, String) {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                i += 2;
                continue;
            }
            b'#' if i > 0 && bytes[i - 1] == b' ' => {
                let comment = s[i + 1..].trim();
                if let Some((directive, reason)) = leading_directive(comment) {
                    return (&s[..i - 1], directive, reason);
                }
            }
            _ => {}
        }
        i += 1;
    }
    (s, Directive::None, String::new())
}

fn leading_directive(comment: &str) -> Option<(Directive, String)> {
    let keyword = comment.get(..4)?;
    let directive = if keyword.eq_ignore_ascii_case("SKIP") {
        Directive::Skip
    } else if keyword.eq_ignore_ascii_case("TODO") {
        Directive::Todo
    } else {
        return None;
    };
    // The keyword must be the whole first word.
    let after = &comment[4..];
    if !after.is_empty() && !after.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    Some((directive, after.trim().to_string()))
}

/// Resolve `\#` and `\\` escapes; any other backslash is preserved.
fn unescape_description(s: &str) -> Cow<'_, str> {
    if !s.contains('\\') {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next @ ('#' | '\\')) => {
                    chars.next();
                    result.push(next);
                }
                _ => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    Cow::Owned(result)
}

/// Parse a `Bail out!` line; the remainder, trimmed, is the reason.
pub fn parse_bail_out(line: &str) -> String {
    line.strip_prefix("Bail out!")
        .unwrap_or(line)
        .trim()
        .to_string()
}

/// Parse a `pragma +key` / `pragma -key` line.
pub fn parse_pragma(line: &str) -> Option<Pragma> {
    let rest = line.strip_prefix("pragma")?.trim_start();
    let mut chars = rest.chars();
    let enabled = match chars.next()? {
        '+' => true,
        '-' => false,
        _ => return None,
    };
    Some(Pragma {
        key: chars.as_str().to_string(),
        enabled,
    })
}
