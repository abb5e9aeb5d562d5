//! Uninstall command

use anyhow::Result;
use arm_core::Reporter;
use arm_core::manifest::split_dependency_key;

use crate::ops::Project;
use crate::ops::install::uninstall_dependency;

/// Remove one dependency (or all when `package` is None) from the manifest,
/// lockfile and every sink it was installed into.
///
/// Uninstalling something that is not installed is not an error.
pub async fn uninstall(project: &Project, package: Option<&str>) -> Result<()> {
    let _lock = project.lock().await?;
    let mut manifest = project.manifest().await?;
    let mut lock = project.lockfile().await?;

    let keys: Vec<String> = match package {
        Some(key) => {
            split_dependency_key(key)?;
            if !manifest.dependencies.contains_key(key) {
                project.reporter.info(&format!("{key} is not installed"));
                return Ok(());
            }
            vec![key.to_string()]
        }
        None => manifest.dependencies.keys().cloned().collect(),
    };

    if project.dry_run {
        for key in &keys {
            project.output.dry_run(&format!("would uninstall {key}"));
        }
        return Ok(());
    }

    project.reporter.section("Uninstalling");
    for key in &keys {
        if let Some(dep) = manifest.dependencies.get(key) {
            uninstall_dependency(project, &manifest, key, dep)?;
        }
        manifest.dependencies.remove(key);
        lock.remove(key);
    }
    project.save_manifest(&manifest).await?;
    project.save_lockfile(&lock).await?;
    project
        .reporter
        .success(&format!("Uninstalled {}", if keys.is_empty() { "nothing".to_string() } else { keys.join(", ") }));
    Ok(())
}
