//! Update and upgrade commands

use anyhow::Result;
use arm_core::Reporter;
use arm_core::resolver::{ResolveMode, upgraded_constraint};

use crate::ops::Project;
use crate::ops::install::install_dependency;

/// Re-resolve every dependency. `Update` stays within each constraint;
/// `Upgrade` moves to the newest version and rewrites the constraint.
pub async fn update(project: &Project, mode: ResolveMode) -> Result<()> {
    let _lock = project.lock().await?;
    let mut manifest = project.manifest().await?;
    if manifest.dependencies.is_empty() {
        project.reporter.info("No dependencies in manifest.");
        return Ok(());
    }

    let verb = if mode == ResolveMode::Upgrade { "upgrade" } else { "update" };
    if project.dry_run {
        for key in manifest.dependencies.keys() {
            project.output.dry_run(&format!("would {verb} {key}"));
        }
        return Ok(());
    }

    project
        .reporter
        .section(if mode == ResolveMode::Upgrade { "Upgrading" } else { "Updating" });
    let mut lock = project.lockfile().await?;
    let before = lock.clone();
    let deps = manifest.dependencies.clone();
    for (key, dep) in &deps {
        let res = install_dependency(project, &manifest, &mut lock, key, dep, mode).await?;
        if mode == ResolveMode::Upgrade {
            let constraint = upgraded_constraint(&res.resolved);
            if let Some(entry) = manifest.dependencies.get_mut(key) {
                if entry.version != constraint {
                    project
                        .reporter
                        .info(&format!("{key}: constraint {} → {constraint}", entry.version));
                    entry.version = constraint;
                }
            }
        }
    }

    if mode == ResolveMode::Upgrade {
        project.save_manifest(&manifest).await?;
    }
    project.save_lockfile(&lock).await?;

    let changed = lock
        .dependencies
        .keys()
        .filter(|k| !before.dependencies.contains_key(*k))
        .count();
    project.reporter.success(&match changed {
        0 => "All dependencies are up to date".to_string(),
        1 => "1 dependency changed".to_string(),
        n => format!("{n} dependencies changed"),
    });
    Ok(())
}
