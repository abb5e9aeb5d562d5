//! Info command

use anyhow::{Result, bail};
use arm_core::ArmError;

use crate::ops::Project;
use crate::ui::table;

/// Show a registry's configuration
pub async fn registry(project: &Project, name: &str) -> Result<()> {
    let manifest = project.manifest().await?;
    let reg = manifest.registry(name)?;
    let mut rows = vec![("name", name.to_string())];
    rows.extend(reg.fields());
    rows.push(("key", reg.key()));
    println!("{}", table::fields(rows));
    Ok(())
}

/// Show a sink's configuration and what is installed in it
pub async fn sink(project: &Project, name: &str) -> Result<()> {
    let manifest = project.manifest().await?;
    let sink = manifest.sink(name)?;
    let installer = project.installer(sink);
    let rulesets = installer.list_rulesets()?;
    let promptsets = installer.list_promptsets()?;

    let join = |items: Vec<String>| if items.is_empty() { "-".to_string() } else { items.join(", ") };
    println!(
        "{}",
        table::fields([
            ("name", name.to_string()),
            ("tool", sink.tool.to_string()),
            ("layout", sink.layout().to_string()),
            ("directory", sink.directory.clone()),
            (
                "rulesets",
                join(rulesets.iter().map(|r| format!("{}/{}@{}", r.registry, r.package, r.version)).collect()),
            ),
            (
                "promptsets",
                join(promptsets.iter().map(|p| format!("{}/{}@{}", p.registry, p.package, p.version)).collect()),
            ),
        ])
    );
    Ok(())
}

/// Show a dependency's constraint, lock pin, sinks and selector
pub async fn dependency(project: &Project, name: &str) -> Result<()> {
    let manifest = project.manifest().await?;
    let Some(dep) = manifest.dependencies.get(name) else {
        bail!(ArmError::config(format!("unknown dependency '{name}'")));
    };
    let locked = project.lockfile().await?.find(name);

    let or_dash = |s: String| if s.is_empty() { "-".to_string() } else { s };
    println!(
        "{}",
        table::fields([
            ("name", name.to_string()),
            ("kind", dep.kind.to_string()),
            ("constraint", dep.version.clone()),
            ("locked", locked.as_ref().map_or_else(|| "-".to_string(), |l| l.version.clone())),
            (
                "integrity",
                locked.map_or_else(|| "-".to_string(), |l| or_dash(l.integrity.to_string())),
            ),
            ("priority", dep.effective_priority().to_string()),
            ("sinks", or_dash(dep.sinks.join(", "))),
            ("include", or_dash(dep.include.join(", "))),
            ("exclude", or_dash(dep.exclude.join(", "))),
        ])
    );
    Ok(())
}
