//! Outdated command: compare locked versions with what registries offer

use anyhow::Result;
use arm_core::manifest::split_dependency_key;
use arm_schema::Constraint;
use tracing::debug;

use crate::ops::Project;
use crate::ui::table;

/// Report dependencies whose newest available version differs from the
/// locked one. Read-only.
pub async fn outdated(project: &Project) -> Result<()> {
    let manifest = project.manifest().await?;
    let lock = project.lockfile().await?;

    let mut t = table::table(&["NAME", "CONSTRAINT", "LOCKED", "WANTED", "LATEST"]);
    for (key, dep) in &manifest.dependencies {
        let (registry, package) = split_dependency_key(key)?;
        let adapter = project.adapter(&manifest, registry)?;
        let versions = {
            let _guard = project.storage.lock_registry(&adapter.key(), &project.ctx).await?;
            adapter
                .list_versions(&project.ctx, package)
                .await
                .map_err(|e| e.for_package(key))?
        };

        let latest = Constraint::Latest
            .find_best_match(&versions)
            .map(|v| v.display.clone())
            .ok();
        let wanted = Constraint::parse_with_refs(&dep.version, versions.iter().map(|v| v.id.as_str()))
            .ok()
            .and_then(|c| c.find_best_match(&versions).ok().map(|v| v.display.clone()));
        let locked = lock.find(key).map(|l| l.version);
        debug!(dependency = %key, ?locked, ?wanted, ?latest, "checked");

        if latest.is_some() && latest == locked {
            continue;
        }
        let dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        t.add_row(vec![key.clone(), dep.version.clone(), dash(locked), dash(wanted), dash(latest)]);
    }
    table::print(&t, "All dependencies are up to date.");
    Ok(())
}
