//! Remove command (registries and sinks)

use anyhow::Result;
use arm_core::Reporter;

use crate::ops::Project;

/// Remove a registry from the manifest
pub async fn registry(project: &Project, name: &str) -> Result<()> {
    let _lock = project.lock().await?;
    let mut manifest = project.manifest().await?;
    manifest.remove_registry(name)?;
    if project.dry_run {
        project.output.dry_run(&format!("would remove registry '{name}'"));
        return Ok(());
    }
    project.save_manifest(&manifest).await?;
    project.reporter.success(&format!("Removed registry '{name}'"));
    Ok(())
}

/// Remove a sink from the manifest. Its directory is left alone.
pub async fn sink(project: &Project, name: &str) -> Result<()> {
    let _lock = project.lock().await?;
    let mut manifest = project.manifest().await?;
    manifest.remove_sink(name)?;
    if project.dry_run {
        project.output.dry_run(&format!("would remove sink '{name}'"));
        return Ok(());
    }
    project.save_manifest(&manifest).await?;
    project.reporter.success(&format!("Removed sink '{name}'"));
    Ok(())
}
