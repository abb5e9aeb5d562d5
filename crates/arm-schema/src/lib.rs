//! Shared types and wire formats for ARM.
//!
//! This crate holds everything that is pure data or pure computation:
//! canonical cache keys, the integrity digest, version constraints, the
//! content selector, and the canonical `Ruleset`/`Promptset` model. It
//! performs no I/O so both the core library and the CLI can depend on it.

pub mod hash;
pub mod merkle;
pub mod resource;
pub mod types;
pub mod version;

// Re-exports
pub use hash::*;
pub use merkle::integrity_of;
pub use resource::{
    Enforcement, Metadata, Prompt, Promptset, PromptsetSpec, ResourceError, Rule, Ruleset,
    RulesetSpec, Scope,
};
pub use types::*;
pub use version::{Constraint, ConstraintError, Version, VersionKind};

/// Default rule priority when a rule does not declare one.
pub const DEFAULT_RULE_PRIORITY: i64 = 80;

/// Default dependency priority used when `install` is not given `--priority`.
pub const DEFAULT_PACKAGE_PRIORITY: i64 = 100;
