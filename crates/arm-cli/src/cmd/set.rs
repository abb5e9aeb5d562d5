//! Set command: change one registry or sink field

use anyhow::Result;
use arm_core::Reporter;

use crate::ops::Project;

/// Which manifest section `set` edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Registry,
    Sink,
}

pub async fn set(project: &Project, section: Section, name: &str, field: &str, value: &str) -> Result<()> {
    let _lock = project.lock().await?;
    let mut manifest = project.manifest().await?;
    let label = match section {
        Section::Registry => {
            manifest.set_registry_field(name, field, value)?;
            "registry"
        }
        Section::Sink => {
            manifest.set_sink_field(name, field, value)?;
            "sink"
        }
    };

    if project.dry_run {
        project
            .output
            .dry_run(&format!("would set {label} '{name}' {field} = {value}"));
        return Ok(());
    }
    project.save_manifest(&manifest).await?;
    project
        .reporter
        .success(&format!("Updated {label} '{name}': {field} = {value}"));
    Ok(())
}
