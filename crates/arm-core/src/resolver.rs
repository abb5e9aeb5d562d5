//! Resolve a dependency to a concrete version and its filtered content.
//!
//! Everything that touches the registry's cache runs under that registry's
//! lock, held for the whole resolve so the cached version cannot be evicted
//! between lookup and read.

use arm_schema::version::is_commit_sha;
use arm_schema::{
    Constraint, ConstraintError, ContentSelector, File, Integrity, Sha256Hash, Version, VersionKind,
    integrity_of, package_key,
};
use tracing::{debug, info};

use crate::context::OpContext;
use crate::error::{ArmError, Result};
use crate::io::extract;
use crate::manifest::Locked;
use crate::registry::{RegistryAdapter, ResolvedVersion};
use crate::storage::{PackageMetadata, RegistryGuard, RegistryMetadata, Storage};

/// Which command is resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Prefer the locked version when the constraint still accepts it.
    Install,
    /// Newest version satisfying the constraint.
    Update,
    /// Newest version overall; branch constraints stay on their branch.
    Upgrade,
}

/// One dependency to resolve.
#[derive(Debug, Clone)]
pub struct ResolveRequest<'a> {
    pub registry: &'a str,
    pub package: &'a str,
    pub constraint: &'a str,
    pub selector: &'a ContentSelector,
    pub locked: Option<&'a Locked>,
    pub mode: ResolveMode,
}

impl ResolveRequest<'_> {
    /// `<registry>/<package>`.
    pub fn dependency(&self) -> String {
        format!("{}/{}", self.registry, self.package)
    }
}

/// A resolved dependency with its filtered files.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub resolved: ResolvedVersion,
    pub files: Vec<File>,
    pub integrity: Integrity,
    /// No registry fetch was needed.
    pub from_cache: bool,
}

/// Cache directory key for a package: the selector key scoped by name, so
/// two packages of one registry with the same selector do not share files.
pub fn cache_key(package: &str, selector: &ContentSelector) -> String {
    let selector_key = package_key(selector);
    Sha256Hash::compute(format!("{package}\0{}", selector_key.as_str()).as_bytes())
        .as_str()
        .to_string()
}

/// Constraint string to write back to the manifest after an upgrade.
///
/// Semver outcomes become `^X.Y.Z`. A commit reached through a branch keeps
/// the branch name; any other commit is pinned by its full hash.
pub fn upgraded_constraint(resolved: &ResolvedVersion) -> String {
    if let Some(v) = resolved.version.semver() {
        return format!("^{}.{}.{}", v.major, v.minor, v.patch);
    }
    match resolved.version.kind {
        VersionKind::Commit if resolved.reference != resolved.version.id => resolved.reference.clone(),
        VersionKind::Commit | VersionKind::Branch => resolved.version.id.clone(),
        VersionKind::Tag => resolved.version.display.clone(),
    }
}

/// Whether a manifest constraint names a branch (not semver, `latest`, or
/// a commit hash).
fn is_branch_constraint(raw: &str) -> bool {
    matches!(Constraint::parse(raw), Err(ConstraintError::Unrecognized(r)) if !is_commit_sha(&r))
}

fn locked_is_acceptable(req: &ResolveRequest<'_>, locked: &Locked) -> bool {
    match Constraint::parse(req.constraint) {
        Ok(c) => c.accepts_locked(&locked.version),
        // Branch or commit: the lock pins what it last resolved to.
        Err(ConstraintError::Unrecognized(_)) => true,
        Err(_) => false,
    }
}

/// Resolve `req` through `adapter`, using and filling the cache.
///
/// # Errors
///
/// Resolution, transport and parse failures are returned attributed to the
/// dependency. Content whose integrity differs from the lock entry for the
/// same version fails with [`ArmError::IntegrityMismatch`].
pub async fn resolve(
    ctx: &OpContext,
    storage: &Storage,
    adapter: &dyn RegistryAdapter,
    req: &ResolveRequest<'_>,
) -> Result<Resolution> {
    let dependency = req.dependency();
    resolve_inner(ctx, storage, adapter, req)
        .await
        .map_err(|e| e.for_package(dependency))
}

async fn resolve_inner(
    ctx: &OpContext,
    storage: &Storage,
    adapter: &dyn RegistryAdapter,
    req: &ResolveRequest<'_>,
) -> Result<Resolution> {
    ctx.check()?;
    let guard = storage.lock_registry(&adapter.key(), ctx).await?;
    guard.write_metadata(&RegistryMetadata {
        url: adapter.url().to_string(),
        registry_type: adapter.registry_type().to_string(),
    })?;
    let pkey = cache_key(req.package, req.selector);

    let locked = req
        .locked
        .filter(|l| req.mode == ResolveMode::Install && locked_is_acceptable(req, l));

    if let Some(locked) = locked {
        if let Some(hit) = reuse_locked(&guard, &pkey, req, locked)? {
            return Ok(hit);
        }
    }

    let target = match (req.mode, locked) {
        (ResolveMode::Install, Some(l)) => l.version.clone(),
        (ResolveMode::Upgrade, _) if !is_branch_constraint(req.constraint) => "latest".to_string(),
        _ => req.constraint.to_string(),
    };
    debug!(dependency = %req.dependency(), target, "resolving");
    let resolved = adapter.resolve_version(ctx, req.package, &target).await?;
    ctx.check()?;

    let (raw, from_cache) = fetch(ctx, &guard, &pkey, adapter, req, &resolved.version).await?;
    let files = extract::process(raw, req.selector)?;
    let integrity = integrity_of(&files);

    if let Some(l) = req.locked {
        if l.version == resolved.version.display && !l.integrity.is_empty() && l.integrity != integrity {
            return Err(ArmError::IntegrityMismatch {
                package: format!("{}@{}", req.dependency(), resolved.version),
                expected: l.integrity.to_string(),
                got: integrity.to_string(),
            });
        }
    }

    info!(
        dependency = %req.dependency(),
        version = %resolved.version,
        files = files.len(),
        from_cache,
        "resolved"
    );
    Ok(Resolution {
        resolved,
        files,
        integrity,
        from_cache,
    })
}

/// The locked version straight from cache, if present and still intact.
fn reuse_locked(
    guard: &RegistryGuard,
    pkey: &str,
    req: &ResolveRequest<'_>,
    locked: &Locked,
) -> Result<Option<Resolution>> {
    let Some(meta) = guard.version_metadata(pkey, &locked.version)? else {
        return Ok(None);
    };
    let raw = match guard.get_package_version(pkey, &locked.version) {
        Ok(raw) => raw,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };
    let files = extract::process(raw, req.selector)?;
    let integrity = integrity_of(&files);
    if integrity != locked.integrity {
        debug!(dependency = %req.dependency(), version = %locked.version, "cached content differs from lock");
        return Ok(None);
    }

    let constraint = Constraint::parse(req.constraint)
        .unwrap_or_else(|_| Constraint::BranchHead(req.constraint.to_string()));
    debug!(dependency = %req.dependency(), version = %meta.version, "reusing locked version from cache");
    Ok(Some(Resolution {
        resolved: ResolvedVersion {
            constraint,
            reference: meta.version.id.clone(),
            version: meta.version,
        },
        files,
        integrity,
        from_cache: true,
    }))
}

async fn fetch(
    ctx: &OpContext,
    guard: &RegistryGuard,
    pkey: &str,
    adapter: &dyn RegistryAdapter,
    req: &ResolveRequest<'_>,
    version: &Version,
) -> Result<(Vec<File>, bool)> {
    match guard.get_package_version(pkey, &version.display) {
        Ok(files) => return Ok((files, true)),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    debug!(dependency = %req.dependency(), version = %version, "cache miss");
    let files = adapter.get_content(ctx, req.package, version, req.selector).await?;
    ctx.check()?;
    guard.set_package_version(
        pkey,
        &PackageMetadata {
            name: req.package.to_string(),
            selector: req.selector.clone(),
        },
        version,
        &files,
    )?;
    Ok((files, false))
}
