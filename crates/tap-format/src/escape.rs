//! Escaping for test point descriptions.
//!
//! A description may contain `#` and `\`, which collide with the directive
//! comment syntax. The writer escapes them on the way out; readers resolve
//! `\#` and `\\` back to the literal characters.

use std::borrow::Cow;

/// Escape a description for a test point line.
///
/// `\` must be escaped before `#` so the output never manufactures an
/// escape sequence that was not in the input.
pub fn escape_description(description: &str) -> Cow<'_, str> {
    if !description.contains(['#', '\\']) {
        return Cow::Borrowed(description);
    }

    let mut result = String::with_capacity(description.len() + 4);
    for c in description.chars() {
        match c {
            '\\' => result.push_str(r"\\"),
            '#' => result.push_str(r"\#"),
            c => result.push(c),
        }
    }
    Cow::Owned(result)
}
