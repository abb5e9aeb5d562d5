//! Clean command (cache eviction)

use std::time::Duration;

use anyhow::Result;
use arm_core::Reporter;

use crate::ops::Project;

/// Evict cached versions idle longer than `max_age`, or remove the whole
/// storage tree with `nuke`. Project files and sinks are never touched.
pub async fn cache(project: &Project, max_age: Duration, nuke: bool) -> Result<()> {
    let root = project.storage.root().display().to_string();
    if nuke {
        if project.dry_run {
            project.output.dry_run(&format!("would remove {root}"));
            return Ok(());
        }
        project.storage.nuke()?;
        project.reporter.success(&format!("Removed {root}"));
        return Ok(());
    }

    if project.dry_run {
        project
            .output
            .dry_run(&format!("would evict versions unused for {}s from {root}", max_age.as_secs()));
        return Ok(());
    }
    let report = project.storage.cleanup(max_age, &project.ctx).await?;
    project.reporter.success(&format!(
        "Evicted {} version(s) and {} package(s)",
        report.versions_removed, report.packages_removed
    ));
    Ok(())
}
