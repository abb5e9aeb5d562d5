//! In-memory archive handling.

pub mod extract;
