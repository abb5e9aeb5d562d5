//! arm - AI Rules Manager
//!
//! Installs versioned rulesets and promptsets from Git, GitLab and
//! Cloudsmith registries into the configuration directories of AI coding
//! tools (Cursor, Amazon Q, Copilot, plain Markdown).
//!
//! # Project Files
//!
//! ```text
//! <project>/
//! ├── arm.json        # registries, sinks, dependencies
//! ├── arm-lock.json   # resolved versions and integrity pins
//! └── <sink>/         # compiled output per tool
//! ```
//!
//! The package cache lives under `~/.arm/storage` (or `$ARM_CACHE_DIR`).
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]

pub mod cmd;
pub mod ops;
pub mod ui;

pub use arm_core::USER_AGENT;

use std::path::PathBuf;
use std::time::Duration;

use arm_schema::{Layout, Tool};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Parse a duration such as `7d`, `30m`, `12h`, `0s` or `2w`.
///
/// A bare number is read as seconds.
///
/// # Example
///
/// ```
/// use arm_cli::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(7 * 86_400));
/// assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1_800));
/// assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
/// assert!(parse_duration("soon").is_err());
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{s}': expected e.g. 7d, 30m, 0s"))?;
    let scale = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return Err(format!("invalid duration unit '{unit}' in '{s}'")),
    };
    value
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

fn parse_tool(s: &str) -> Result<Tool, String> {
    Tool::parse(s).ok_or_else(|| format!("unknown tool '{s}' (cursor, amazonq, copilot, markdown)"))
}

fn parse_layout(s: &str) -> Result<Layout, String> {
    Layout::parse(s).ok_or_else(|| format!("unknown layout '{s}' (hierarchical, flat)"))
}

#[derive(Debug, Parser)]
#[command(name = "arm")]
#[command(author, version, about = "arm - package manager for AI rulesets and promptsets")]
pub struct Cli {
    /// Path to the project manifest
    #[arg(long, global = true, env = "ARM_MANIFEST", default_value = arm_core::MANIFEST_FILE)]
    pub manifest: PathBuf,

    /// Path to the project lockfile
    #[arg(long, global = true, env = "ARM_LOCK", default_value = arm_core::LOCK_FILE)]
    pub lock: PathBuf,

    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add a registry or sink
    Add {
        #[command(subcommand)]
        target: AddCommands,
    },
    /// Remove a registry or sink
    Remove {
        #[command(subcommand)]
        target: NamedTarget,
    },
    /// List registries, sinks or dependencies
    List {
        #[arg(value_enum)]
        target: ListTarget,
    },
    /// Show details of a registry, sink or dependency
    Info {
        #[command(subcommand)]
        target: InfoTarget,
    },
    /// Change one field of a registry or sink
    Set {
        #[command(subcommand)]
        target: SetTarget,
    },
    /// Install a package, or every dependency in the manifest
    Install {
        #[command(subcommand)]
        kind: Option<InstallCommands>,
    },
    /// Uninstall a dependency, or all of them
    Uninstall {
        /// Dependency as <registry>/<package>
        package: Option<String>,
    },
    /// Re-resolve dependencies within their constraints
    Update,
    /// Move dependencies to their newest versions and rewrite constraints
    Upgrade,
    /// Show dependencies with newer versions available
    Outdated,
    /// Remove cached data
    Clean {
        #[command(subcommand)]
        target: CleanCommands,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegistryType {
    Git,
    Gitlab,
    Cloudsmith,
}

#[derive(Debug, Subcommand)]
pub enum AddCommands {
    /// Add a registry
    Registry(AddRegistryArgs),
    /// Add a sink
    Sink(AddSinkArgs),
}

#[derive(Debug, Args)]
pub struct AddRegistryArgs {
    /// Registry type
    #[arg(value_enum)]
    pub kind: RegistryType,
    /// Registry name used in <registry>/<package>
    pub name: String,
    /// Repository or API base URL
    #[arg(long)]
    pub url: Option<String>,
    /// GitLab project ID
    #[arg(long)]
    pub project_id: Option<String>,
    /// GitLab group ID
    #[arg(long)]
    pub group_id: Option<String>,
    /// GitLab API version
    #[arg(long)]
    pub api_version: Option<String>,
    /// Cloudsmith owner
    #[arg(long)]
    pub owner: Option<String>,
    /// Cloudsmith repository
    #[arg(long = "repo")]
    pub repository: Option<String>,
    /// Git branches to track (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub branches: Vec<String>,
    /// Overwrite an existing registry
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct AddSinkArgs {
    /// Sink name
    pub name: String,
    /// Output directory, relative to the project
    pub directory: String,
    /// Tool the sink feeds
    #[arg(long, value_parser = parse_tool)]
    pub tool: Tool,
    /// Directory layout (defaults per tool)
    #[arg(long, value_parser = parse_layout)]
    pub layout: Option<Layout>,
    /// Overwrite an existing sink
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(Debug, Subcommand)]
pub enum NamedTarget {
    /// A registry
    Registry { name: String },
    /// A sink
    Sink { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListTarget {
    Registry,
    Sink,
    Dependency,
}

#[derive(Debug, Subcommand)]
pub enum InfoTarget {
    /// A registry
    Registry { name: String },
    /// A sink
    Sink { name: String },
    /// A dependency (<registry>/<package>)
    Dependency { name: String },
}

#[derive(Debug, Subcommand)]
pub enum SetTarget {
    /// Set a registry field
    Registry {
        name: String,
        field: String,
        value: String,
    },
    /// Set a sink field
    Sink {
        name: String,
        field: String,
        value: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum InstallCommands {
    /// Install a ruleset package
    Ruleset(InstallArgs),
    /// Install a promptset package
    Promptset(InstallArgs),
}

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Package as <registry>/<package>[@<constraint>]
    pub package: String,
    /// Sinks to install into
    #[arg(required = true)]
    pub sinks: Vec<String>,
    /// Ruleset priority in the sink index (higher wins)
    #[arg(long)]
    pub priority: Option<i64>,
    /// Glob of files to include (repeatable)
    #[arg(long)]
    pub include: Vec<String>,
    /// Glob of files to exclude (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum CleanCommands {
    /// Evict cached package versions
    Cache {
        /// Evict versions not used within this duration
        #[arg(long, value_parser = parse_duration, default_value = "7d")]
        max_age: Duration,
        /// Remove the whole storage directory
        #[arg(long, conflicts_with = "max_age")]
        nuke: bool,
    },
}
