//! Orchestration shared by the command handlers.

pub mod context;
pub mod error;
pub mod install;

pub use context::Project;
pub use error::{exit_code, render};
