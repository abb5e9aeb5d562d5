//! Shared project context.
//!
//! Groups the state every command needs (project file paths, cache,
//! cancellation, reporter) so handlers do not thread six arguments around.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use arm_core::manifest::{Lockfile, Manifest, SinkConfig};
use arm_core::registry::{self, RegistryAdapter};
use arm_core::installer::Installer;
use arm_core::storage::{FileLock, Storage};
use arm_core::{ArmConfig, OpContext, Reporter};
use tracing::debug;

use crate::Cli;
use crate::ui::Output;

/// One project (`arm.json` + `arm-lock.json`) and the cache it uses.
#[derive(Clone)]
pub struct Project {
    pub manifest_path: PathBuf,
    pub lock_path: PathBuf,
    pub config: ArmConfig,
    pub storage: Storage,
    pub ctx: OpContext,
    pub output: Output,
    pub reporter: Arc<dyn Reporter>,
    pub dry_run: bool,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("manifest_path", &self.manifest_path)
            .field("lock_path", &self.lock_path)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Project {
    pub fn new(cli: &Cli, ctx: OpContext) -> Result<Self> {
        let config = ArmConfig::from_env()?;
        let output = Output::new(cli.quiet);
        Ok(Self {
            manifest_path: cli.manifest.clone(),
            lock_path: cli.lock.clone(),
            storage: Storage::new(&config.cache_dir),
            config,
            ctx,
            output,
            reporter: Arc::new(output),
            dry_run: cli.dry_run,
        })
    }

    /// Directory sink paths are relative to.
    pub fn root(&self) -> &Path {
        self.manifest_path.parent().unwrap_or(Path::new(""))
    }

    /// Serialize commands that rewrite this project's files.
    pub async fn lock(&self) -> Result<FileLock> {
        let root = match self.root() {
            p if p.as_os_str().is_empty() => Path::new("."),
            p => p,
        };
        let canonical = std::fs::canonicalize(root)
            .with_context(|| format!("project directory {} does not exist", root.display()))?;
        let key = arm_schema::generic_key(&canonical.to_string_lossy())?;
        let lock = self
            .storage
            .lock_named(&format!("project-{}", key.prefix(16)), &self.ctx)
            .await?;
        debug!(project = %canonical.display(), "acquired project lock");
        Ok(lock)
    }

    pub async fn manifest(&self) -> Result<Manifest> {
        Ok(Manifest::load(&self.manifest_path).await?)
    }

    pub async fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        Ok(manifest.save(&self.manifest_path).await?)
    }

    pub async fn lockfile(&self) -> Result<Lockfile> {
        Ok(Lockfile::load(&self.lock_path).await?)
    }

    pub async fn save_lockfile(&self, lock: &Lockfile) -> Result<()> {
        Ok(lock.save(&self.lock_path).await?)
    }

    pub fn installer(&self, sink: &SinkConfig) -> Installer {
        Installer::new(self.root().join(&sink.directory), sink.tool, sink.layout())
    }

    pub fn adapter(&self, manifest: &Manifest, registry: &str) -> Result<Box<dyn RegistryAdapter>> {
        let cfg = manifest.registry(registry)?;
        Ok(registry::adapter_for(cfg, &self.config, &self.storage)?)
    }
}
