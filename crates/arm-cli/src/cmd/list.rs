//! List command

use anyhow::Result;

use crate::ListTarget;
use crate::ops::Project;
use crate::ui::table;

/// List registries, sinks or dependencies from the manifest
pub async fn list(project: &Project, target: ListTarget) -> Result<()> {
    let manifest = project.manifest().await?;
    match target {
        ListTarget::Registry => {
            let mut t = table::table(&["NAME", "TYPE", "URL"]);
            for (name, reg) in &manifest.registries {
                t.add_row(vec![name.clone(), reg.type_name().to_string(), reg.url().to_string()]);
            }
            table::print(&t, "No registries configured.");
        }
        ListTarget::Sink => {
            let mut t = table::table(&["NAME", "TOOL", "LAYOUT", "DIRECTORY"]);
            for (name, sink) in &manifest.sinks {
                t.add_row(vec![
                    name.clone(),
                    sink.tool.to_string(),
                    sink.layout().to_string(),
                    sink.directory.clone(),
                ]);
            }
            table::print(&t, "No sinks configured.");
        }
        ListTarget::Dependency => {
            let lock = project.lockfile().await?;
            let mut t = table::table(&["NAME", "KIND", "CONSTRAINT", "LOCKED", "SINKS"]);
            for (key, dep) in &manifest.dependencies {
                let locked = lock.find(key).map_or_else(|| "-".to_string(), |l| l.version);
                t.add_row(vec![
                    key.clone(),
                    dep.kind.to_string(),
                    dep.version.clone(),
                    locked,
                    dep.sinks.join(", "),
                ]);
            }
            table::print(&t, "No dependencies installed.");
        }
    }
    Ok(())
}
