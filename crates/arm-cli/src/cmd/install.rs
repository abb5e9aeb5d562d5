//! Install command

use anyhow::Result;
use arm_core::Reporter;
use arm_core::manifest::{Dependency, split_dependency_key};
use arm_core::resolver::ResolveMode;
use arm_schema::{ContentSelector, ResourceKind};

use crate::InstallArgs;
use crate::ops::Project;
use crate::ops::install::{DEFAULT_INCLUDE, install_dependency, parse_package_ref};

/// Install one package and record it in the manifest and lockfile
pub async fn install_package(project: &Project, kind: ResourceKind, args: InstallArgs) -> Result<()> {
    let (key, constraint) = parse_package_ref(&args.package)?;
    let include = if args.include.is_empty() {
        DEFAULT_INCLUDE.iter().map(|s| (*s).to_string()).collect()
    } else {
        args.include
    };
    ContentSelector::new(include.clone(), args.exclude.clone())
        .validate()
        .map_err(arm_core::ArmError::config)?;

    let _lock = project.lock().await?;
    let mut manifest = project.manifest().await?;
    let (registry, _) = split_dependency_key(&key)?;
    manifest.registry(registry)?;
    for sink in &args.sinks {
        manifest.sink(sink)?;
    }

    let mut dep = Dependency {
        version: constraint,
        priority: args.priority,
        sinks: args.sinks,
        include,
        exclude: args.exclude,
        kind,
    };
    if let Some(existing) = manifest.dependencies.get(&key) {
        dep.merge_sinks(&existing.sinks);
    }

    if project.dry_run {
        project.output.dry_run(&format!(
            "would install {kind} {key}@{} into {}",
            dep.version,
            dep.sinks.join(", ")
        ));
        return Ok(());
    }

    project.reporter.section("Installing");
    let mut lock = project.lockfile().await?;
    let res = install_dependency(project, &manifest, &mut lock, &key, &dep, ResolveMode::Install).await?;
    manifest.upsert_dependency(&key, dep);
    project.save_manifest(&manifest).await?;
    project.save_lockfile(&lock).await?;
    project
        .reporter
        .success(&format!("Installed {key}@{}", res.resolved.version));
    Ok(())
}

/// Install every manifest dependency, honoring the lockfile
pub async fn install_all(project: &Project) -> Result<()> {
    let _lock = project.lock().await?;
    let manifest = project.manifest().await?;
    if manifest.dependencies.is_empty() {
        project.reporter.info("No dependencies in manifest.");
        return Ok(());
    }

    if project.dry_run {
        for (key, dep) in &manifest.dependencies {
            project
                .output
                .dry_run(&format!("would install {key}@{} into {}", dep.version, dep.sinks.join(", ")));
        }
        return Ok(());
    }

    project.reporter.section("Installing");
    let mut lock = project.lockfile().await?;
    for (key, dep) in &manifest.dependencies {
        install_dependency(project, &manifest, &mut lock, key, dep, ResolveMode::Install).await?;
    }
    project.save_lockfile(&lock).await?;
    let n = manifest.dependencies.len();
    project.reporter.success(&format!(
        "Installed {n} {}",
        if n == 1 { "dependency" } else { "dependencies" }
    ));
    Ok(())
}
