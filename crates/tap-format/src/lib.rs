//! TAP version 14 output writer.
//!
//! [`TapWriter`] emits a syntactically valid TAP-14 stream from structured
//! calls: test points, plans, directives, bail-outs, comments, YAML
//! diagnostic blocks and nested subtests. Output is deterministic (YAML keys
//! in lexicographic order) so golden-file comparisons stay byte-stable, and
//! descriptions are escaped so anything written here parses back unchanged.

pub mod escape;
mod writer;

pub use writer::TapWriter;
