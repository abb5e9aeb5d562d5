//! Install flow: resolve → parse → compile per sink → write.

use anyhow::Result;
use arm_core::compiler::{self, Namespace};
use arm_core::manifest::{Dependency, Lockfile, Manifest, split_dependency_key};
use arm_core::parser;
use arm_core::resolver::{self, Resolution, ResolveMode, ResolveRequest};
use arm_core::{ArmError, Reporter};
use arm_schema::ResourceKind;
use tracing::{debug, info};

use super::context::Project;

/// Default include globs when a package is installed without `--include`.
pub const DEFAULT_INCLUDE: [&str; 2] = ["**/*.yml", "**/*.yaml"];

/// Split `<registry>/<package>[@<constraint>]`. The constraint defaults to
/// `latest`.
pub fn parse_package_ref(spec: &str) -> Result<(String, String)> {
    let (key, constraint) = match spec.rsplit_once('@') {
        Some((key, c)) if !c.is_empty() => (key, c),
        Some((key, _)) => (key, "latest"),
        None => (spec, "latest"),
    };
    split_dependency_key(key)?;
    Ok((key.to_string(), constraint.to_string()))
}

/// Resolve one dependency and install it into each of its sinks, then pin
/// it in `lock`.
///
/// Nothing is written to a sink until resolution and parsing succeed.
pub async fn install_dependency(
    project: &Project,
    manifest: &Manifest,
    lock: &mut Lockfile,
    key: &str,
    dep: &Dependency,
    mode: ResolveMode,
) -> Result<Resolution> {
    let (registry, package) = split_dependency_key(key)?;
    let sinks = dep
        .sinks
        .iter()
        .map(|name| manifest.sink(name).map(|cfg| (name.as_str(), cfg)))
        .collect::<Result<Vec<_>, ArmError>>()?;

    let adapter = project.adapter(manifest, registry)?;
    let selector = dep.selector();
    let locked = lock.find(key);
    project.reporter.resolving(key, &dep.version);

    let resolution = resolver::resolve(
        &project.ctx,
        &project.storage,
        adapter.as_ref(),
        &ResolveRequest {
            registry,
            package,
            constraint: &dep.version,
            selector: &selector,
            locked: locked.as_ref(),
            mode,
        },
    )
    .await?;

    let ns = Namespace {
        registry: registry.to_string(),
        package: package.to_string(),
        version: resolution.resolved.version.display.clone(),
    };
    let coordinate = ns.to_string();
    project.reporter.fetched(&coordinate, resolution.from_cache);

    let parsed =
        parser::parse_package(&resolution.files, dep.kind).map_err(|e| e.for_package(&coordinate))?;
    if parsed.rulesets.is_empty() && parsed.promptsets.is_empty() {
        project
            .reporter
            .warning(&format!("{coordinate}: no {} found in package", dep.kind));
    }

    for (sink_name, sink) in sinks {
        project.ctx.check()?;
        let files = compiler::compile_package(sink.tool, &ns, &parsed);
        let installer = project.installer(sink);
        let written = match dep.kind {
            ResourceKind::Ruleset => installer.install_ruleset(&ns, dep.effective_priority(), &files),
            ResourceKind::Promptset => installer.install_promptset(&ns, &files),
        }
        .map_err(|e| e.for_package(&coordinate))?;
        debug!(package = %coordinate, sink = sink_name, files = written.len(), "installed into sink");
        project.reporter.installed(&coordinate, sink_name, written.len());
    }

    lock.upsert(key, &ns.version, resolution.integrity.clone());
    info!(package = %coordinate, integrity = %resolution.integrity, "locked");
    Ok(resolution)
}

/// Remove a dependency's files from every sink it lists.
pub fn uninstall_dependency(project: &Project, manifest: &Manifest, key: &str, dep: &Dependency) -> Result<()> {
    let (registry, package) = split_dependency_key(key)?;
    for sink_name in &dep.sinks {
        let Ok(sink) = manifest.sink(sink_name) else {
            project
                .reporter
                .warning(&format!("{key}: sink '{sink_name}' is no longer configured"));
            continue;
        };
        if project.installer(sink).uninstall(registry, package)? {
            project.reporter.removed(key, sink_name);
        }
    }
    Ok(())
}
