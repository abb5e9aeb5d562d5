//! Terminal output.
//!
//! Human-facing messages go to stderr through [`Output`]; tables for
//! `list`, `info` and `outdated` go to stdout so they can be piped.

pub mod output;
pub mod table;

pub use output::Output;
