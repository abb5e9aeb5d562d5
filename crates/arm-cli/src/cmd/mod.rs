//! Command modules - one file per CLI command

pub mod add;
pub mod clean;
pub mod completions;
pub mod info;
pub mod install;
pub mod list;
pub mod outdated;
pub mod remove;
pub mod set;
pub mod uninstall;
pub mod update;
