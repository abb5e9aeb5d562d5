//! Git registry: tags and branches of a remote repository.
//!
//! The remote is mirrored into the registry's `repository/` cache directory
//! and driven through the `git` binary. Callers must hold the registry lock
//! while using the adapter since the working tree is shared.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use arm_schema::{Constraint, ContentSelector, File, Version, VersionKind};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::traits::{RegistryAdapter, ResolvedVersion};
use crate::context::OpContext;
use crate::error::{ArmError, Result};
use crate::io::extract;

const REMOTE_PREFIX: &str = "refs/remotes/origin/";

#[derive(Debug)]
pub struct GitRegistry {
    url: String,
    branches: Vec<String>,
    repo_dir: PathBuf,
    fetched: AtomicBool,
}

impl GitRegistry {
    /// `branches` restricts which remote branches are offered (globs);
    /// empty offers all of them.
    pub fn new(url: impl Into<String>, branches: Vec<String>, repo_dir: PathBuf) -> Self {
        Self {
            url: url.into(),
            branches,
            repo_dir,
            fetched: AtomicBool::new(false),
        }
    }

    async fn git(&self, ctx: &OpContext, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let bin = which::which("git")
            .map_err(|_| ArmError::Transport("git executable not found on PATH".into()))?;
        let mut cmd = Command::new(bin);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!(args = ?args, "git");
        let output = ctx.run(async { Ok(cmd.output().await?) }).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArmError::Transport(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn in_repo(&self, ctx: &OpContext, args: &[&str]) -> Result<String> {
        self.git(ctx, args, Some(&self.repo_dir)).await
    }

    fn is_cloned(&self) -> bool {
        self.repo_dir.join(".git").is_dir()
    }

    /// Clone on first use, otherwise fetch. Fetches at most once per adapter.
    async fn sync(&self, ctx: &OpContext) -> Result<()> {
        if self.fetched.load(Ordering::Acquire) {
            return Ok(());
        }
        if self.is_cloned() {
            self.in_repo(ctx, &["fetch", "--quiet", "--prune", "--tags", "--force", "origin"])
                .await?;
        } else {
            if let Some(parent) = self.repo_dir.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if self.repo_dir.exists() {
                std::fs::remove_dir_all(&self.repo_dir)?;
            }
            info!(url = %self.url, "cloning registry");
            let dest = self.repo_dir.to_string_lossy();
            self.git(ctx, &["clone", "--quiet", "--no-checkout", &self.url, &dest], None)
                .await?;
        }
        self.fetched.store(true, Ordering::Release);
        Ok(())
    }

    fn branch_offered(&self, name: &str) -> bool {
        self.branches.is_empty() || ContentSelector::new(self.branches.clone(), vec![]).matches(name)
    }

    async fn rev_parse(&self, ctx: &OpContext, rev: &str) -> Result<String> {
        let spec = format!("{rev}^{{commit}}");
        let out = self.in_repo(ctx, &["rev-parse", "--verify", "--quiet", &spec]).await?;
        Ok(out.trim().to_string())
    }

    fn checkout_ref(version: &Version) -> String {
        match version.kind {
            VersionKind::Tag => format!("refs/tags/{}", version.id),
            VersionKind::Branch => format!("{REMOTE_PREFIX}{}", version.id),
            VersionKind::Commit => version.id.clone(),
        }
    }

    async fn checkout(&self, ctx: &OpContext, version: &Version) -> Result<()> {
        let target = Self::checkout_ref(version);
        self.in_repo(
            ctx,
            &["-c", "advice.detachedHead=false", "checkout", "--quiet", "--force", &target],
        )
        .await?;
        self.in_repo(ctx, &["clean", "-ffdxq"]).await?;
        Ok(())
    }

    fn read_tree(&self, selector: &ContentSelector) -> Result<Vec<File>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.repo_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");
        for entry in walker {
            let entry = entry.map_err(|e| ArmError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.repo_dir)
                .map_err(|e| ArmError::config(e.to_string()))?
                .to_string_lossy()
                .replace('\\', "/");
            if selector.matches(&rel) || extract::is_archive(&rel) {
                files.push(File::new(&rel, std::fs::read(entry.path())?));
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl RegistryAdapter for GitRegistry {
    fn registry_type(&self) -> &'static str {
        "git"
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn list_versions(&self, ctx: &OpContext, _package: &str) -> Result<Vec<Version>> {
        self.sync(ctx).await?;

        let mut versions: Vec<Version> = self
            .in_repo(ctx, &["tag", "--list"])
            .await?
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Version::tag)
            .collect();

        let refs = self
            .in_repo(ctx, &["for-each-ref", "--format=%(refname)", "refs/remotes/origin"])
            .await?;
        versions.extend(
            refs.lines()
                .filter_map(|r| r.trim().strip_prefix(REMOTE_PREFIX))
                .filter(|b| *b != "HEAD" && self.branch_offered(b))
                .map(Version::branch),
        );

        debug!(url = %self.url, count = versions.len(), "listed versions");
        Ok(versions)
    }

    async fn resolve_version(
        &self,
        ctx: &OpContext,
        package: &str,
        raw: &str,
    ) -> Result<ResolvedVersion> {
        let versions = self.list_versions(ctx, package).await?;
        let constraint = Constraint::parse_with_refs(raw, versions.iter().map(|v| v.id.as_str()))?;

        if let Constraint::Commit(sha) = &constraint {
            let full = self
                .rev_parse(ctx, sha)
                .await
                .map_err(|_| ArmError::NoMatchingVersion(raw.to_string()))?;
            return Ok(ResolvedVersion {
                reference: full.clone(),
                version: Version::commit(full),
                constraint,
            });
        }

        let best = constraint.find_best_match(&versions)?.clone();
        if best.kind == VersionKind::Branch {
            let sha = self.rev_parse(ctx, &format!("{REMOTE_PREFIX}{}", best.id)).await?;
            return Ok(ResolvedVersion {
                reference: best.id,
                version: Version::commit(sha),
                constraint,
            });
        }
        Ok(ResolvedVersion {
            reference: best.id.clone(),
            version: best,
            constraint,
        })
    }

    async fn get_content(
        &self,
        ctx: &OpContext,
        _package: &str,
        version: &Version,
        selector: &ContentSelector,
    ) -> Result<Vec<File>> {
        if !self.is_cloned() {
            self.sync(ctx).await?;
        }
        if let Err(e) = self.checkout(ctx, version).await {
            if self.fetched.load(Ordering::Acquire) {
                return Err(e);
            }
            // Not in the local mirror yet (e.g. a commit pinned by a newer lock).
            self.sync(ctx).await?;
            self.checkout(ctx, version).await?;
        }
        let files = self.read_tree(selector)?;
        debug!(url = %self.url, version = %version, files = files.len(), "read working tree");
        Ok(files)
    }
}
