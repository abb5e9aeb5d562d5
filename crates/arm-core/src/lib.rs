//! Core library for ARM, the AI rules manager.
//!
//! Pipeline per dependency: registry adapter → storage cache → archive
//! expansion and filtering → parser → compiler → installer. The resolver
//! drives the first three steps; the installer owns sink directories.

pub mod compiler;
pub mod context;
pub mod credentials;
pub mod error;
pub mod installer;
pub mod io;
pub mod manifest;
pub mod parser;
pub mod paths;
pub mod registry;
pub mod reporter;
pub mod resolver;
pub mod storage;

pub use context::{ArmConfig, OpContext};
pub use error::{ArmError, ErrorKind, Result};
pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for registry requests
pub const USER_AGENT: &str = concat!("arm/", env!("CARGO_PKG_VERSION"));
