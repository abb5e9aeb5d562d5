//! Content-addressed cache of fetched package versions.
//!
//! ```text
//! <cache>/storage/
//!   .locks/<rkey>.lock
//!   registries/<rkey>/
//!     metadata.json  index.json  repository/
//!     packages/<pkey>/metadata.json
//!     packages/<pkey>/<version>/{metadata.json, files/...}
//! ```
//!
//! All reads and writes of a registry directory happen through a
//! [`RegistryGuard`], which can only be obtained by taking that registry's
//! advisory lock.

pub mod index;
pub mod lock;

use std::path::{Path, PathBuf};

use arm_schema::{File, Version};
use chrono::Utc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::context::OpContext;
use crate::error::{ArmError, Result};
use crate::paths;

pub use index::{PackageMetadata, RegistryMetadata, StorageIndex, Timestamps, VersionMetadata};
pub use lock::FileLock;

const FILES_DIR: &str = "files";
const METADATA_FILE: &str = "metadata.json";
const INDEX_FILE: &str = "index.json";

/// Handle on the storage root.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

/// Result of a cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub versions_removed: usize,
    pub packages_removed: usize,
}

impl Storage {
    /// Storage under `<cache_dir>/storage`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            root: paths::storage_path(cache_dir),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn registries_dir(&self) -> PathBuf {
        self.root.join("registries")
    }

    fn locks_dir(&self) -> PathBuf {
        self.root.join(".locks")
    }

    /// Take the advisory lock for `rkey` and return a guard over its cache.
    pub async fn lock_registry(&self, rkey: &str, ctx: &OpContext) -> Result<RegistryGuard> {
        let lock = FileLock::acquire(&self.locks_dir().join(format!("{rkey}.lock")), ctx).await?;
        let dir = self.registries_dir().join(rkey);
        std::fs::create_dir_all(&dir)?;
        Ok(RegistryGuard {
            _lock: lock,
            dir,
            rkey: rkey.to_string(),
        })
    }

    /// Working directory for adapters that keep a local mirror (git clones).
    ///
    /// Only touch it while holding the registry's lock.
    pub fn repository_dir(&self, rkey: &str) -> PathBuf {
        self.registries_dir().join(rkey).join("repository")
    }

    /// Take a named lock that is not tied to a registry (project files).
    pub async fn lock_named(&self, name: &str, ctx: &OpContext) -> Result<FileLock> {
        FileLock::acquire(&self.locks_dir().join(format!("{name}.lock")), ctx).await
    }

    /// Registry keys present on disk.
    pub fn registry_keys(&self) -> Result<Vec<String>> {
        let dir = self.registries_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Evict every version not accessed within `max_age`.
    pub async fn cleanup(&self, max_age: std::time::Duration, ctx: &OpContext) -> Result<CleanupReport> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| ArmError::config(format!("invalid max age: {e}")))?;
        let mut report = CleanupReport::default();
        for rkey in self.registry_keys()? {
            let guard = self.lock_registry(&rkey, ctx).await?;
            let r = guard.evict_older_than(max_age)?;
            report.versions_removed += r.versions_removed;
            report.packages_removed += r.packages_removed;
        }
        info!(
            versions = report.versions_removed,
            packages = report.packages_removed,
            "cache cleanup complete"
        );
        Ok(report)
    }

    /// Delete the whole storage tree.
    pub fn nuke(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
            info!(path = %self.root.display(), "removed storage");
        }
        Ok(())
    }
}

/// Exclusive access to one registry's cache directory.
#[derive(Debug)]
pub struct RegistryGuard {
    _lock: FileLock,
    dir: PathBuf,
    rkey: String,
}

impl RegistryGuard {
    pub fn key(&self) -> &str {
        &self.rkey
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn package_dir(&self, pkey: &str) -> PathBuf {
        self.dir.join("packages").join(pkey)
    }

    fn version_dir(&self, pkey: &str, version: &str) -> PathBuf {
        self.package_dir(pkey).join(paths::fs_safe(version))
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn load_index(&self) -> Result<StorageIndex> {
        Ok(index::read_json(&self.index_path())?.unwrap_or_default())
    }

    fn save_index(&self, idx: &StorageIndex) -> Result<()> {
        index::write_json(&self.index_path(), idx)
    }

    /// Record what this registry is.
    pub fn write_metadata(&self, meta: &RegistryMetadata) -> Result<()> {
        index::write_json(&self.dir.join(METADATA_FILE), meta)
    }

    pub fn has_package_version(&self, pkey: &str, version: &str) -> bool {
        self.version_dir(pkey, version).join(FILES_DIR).is_dir()
    }

    /// Cached metadata for a version, if present.
    pub fn version_metadata(&self, pkey: &str, version: &str) -> Result<Option<VersionMetadata>> {
        index::read_json(&self.version_dir(pkey, version).join(METADATA_FILE))
    }

    /// Read a cached version's files and bump its access time.
    ///
    /// Returns [`ArmError::NotFound`] on a cache miss.
    pub fn get_package_version(&self, pkey: &str, version: &str) -> Result<Vec<File>> {
        let files_dir = self.version_dir(pkey, version).join(FILES_DIR);
        if !files_dir.is_dir() {
            return Err(ArmError::NotFound(format!("{version} not in cache")));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&files_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| ArmError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&files_dir)
                .map_err(|e| ArmError::config(e.to_string()))?;
            let content = std::fs::read(entry.path())?;
            files.push(File::new(rel.to_string_lossy(), content));
        }

        let now = Utc::now();
        let mut idx = self.load_index()?;
        idx.record_access(pkey, version, now);
        self.save_index(&idx)?;
        if let Some(mut meta) = self.version_metadata(pkey, version)? {
            meta.timestamps.touch_access(now);
            index::write_json(&self.version_dir(pkey, version).join(METADATA_FILE), &meta)?;
        }

        debug!(rkey = %self.rkey, pkey, version, files = files.len(), "cache hit");
        Ok(files)
    }

    /// Store a version's files.
    ///
    /// The version directory is assembled in a temp directory next to its
    /// final location and renamed into place, so readers never observe a
    /// partially written version.
    pub fn set_package_version(
        &self,
        pkey: &str,
        package: &PackageMetadata,
        version: &Version,
        files: &[File],
    ) -> Result<()> {
        let pkg_dir = self.package_dir(pkey);
        std::fs::create_dir_all(&pkg_dir)?;
        index::write_json(&pkg_dir.join(METADATA_FILE), package)?;

        let now = Utc::now();
        let staging = tempfile::Builder::new().prefix(".tmp-").tempdir_in(&pkg_dir)?;
        let files_dir = staging.path().join(FILES_DIR);
        std::fs::create_dir_all(&files_dir)?;
        for file in files {
            let dest = safe_join(&files_dir, &file.path)?;
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, &file.content)?;
        }
        index::write_json(
            &staging.path().join(METADATA_FILE),
            &VersionMetadata {
                version: version.clone(),
                timestamps: Timestamps::at(now),
            },
        )?;

        let final_dir = self.version_dir(pkey, &version.display);
        if final_dir.exists() {
            std::fs::remove_dir_all(&final_dir)?;
        }
        std::fs::rename(staging.path(), &final_dir)?;

        let mut idx = self.load_index()?;
        idx.record_update(pkey, &version.display, now);
        self.save_index(&idx)?;

        debug!(rkey = %self.rkey, pkey, version = %version, files = files.len(), "cached version");
        Ok(())
    }

    fn evict_older_than(&self, max_age: chrono::Duration) -> Result<CleanupReport> {
        let mut idx = self.load_index()?;
        let mut report = CleanupReport::default();
        for (pkey, version) in idx.stale(Utc::now(), max_age) {
            let dir = self.version_dir(&pkey, &version);
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
            idx.remove_version(&pkey, &version);
            report.versions_removed += 1;
            debug!(rkey = %self.rkey, pkey, version, "evicted");

            if !idx.packages.contains_key(&pkey) {
                let pkg_dir = self.package_dir(&pkey);
                if let Err(e) = std::fs::remove_dir_all(&pkg_dir) {
                    warn!(path = %pkg_dir.display(), error = %e, "could not remove package dir");
                }
                report.packages_removed += 1;
            }
        }
        self.save_index(&idx)?;
        Ok(report)
    }
}

/// Join a relative file path under `root`, refusing traversal.
pub(crate) fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    let escapes = rel_path.components().any(|c| {
        !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir)
    });
    if escapes || rel.is_empty() {
        return Err(ArmError::Config(format!("refusing unsafe path '{rel}'")));
    }
    Ok(root.join(rel_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arm_schema::ContentSelector;
    use std::time::Duration;

    fn pkg() -> PackageMetadata {
        PackageMetadata {
            name: "rules".into(),
            selector: ContentSelector::new(vec!["**/*.yml".into()], vec![]),
        }
    }

    #[tokio::test]
    async fn set_then_get_returns_same_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let ctx = OpContext::new();
        let guard = storage.lock_registry("rk", &ctx).await.unwrap();

        let files = vec![
            File::new("a/one.yml", b"1".to_vec()),
            File::new("two.yml", b"22".to_vec()),
        ];
        let v = Version::tag("v1.0.0");
        guard.set_package_version("pk", &pkg(), &v, &files).unwrap();

        assert!(guard.has_package_version("pk", "v1.0.0"));
        let got = guard.get_package_version("pk", "v1.0.0").unwrap();
        assert_eq!(got, files);

        let meta = guard.version_metadata("pk", "v1.0.0").unwrap().unwrap();
        assert_eq!(meta.version, v);
    }

    #[tokio::test]
    async fn miss_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let guard = storage.lock_registry("rk", &OpContext::new()).await.unwrap();
        let err = guard.get_package_version("pk", "v9.9.9").unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let guard = storage.lock_registry("rk", &OpContext::new()).await.unwrap();
        let v = Version::tag("v1.0.0");
        guard
            .set_package_version("pk", &pkg(), &v, &[File::new("old.yml", b"x".to_vec())])
            .unwrap();
        guard
            .set_package_version("pk", &pkg(), &v, &[File::new("new.yml", b"y".to_vec())])
            .unwrap();
        let got = guard.get_package_version("pk", "v1.0.0").unwrap();
        assert_eq!(got, vec![File::new("new.yml", b"y".to_vec())]);
    }

    #[tokio::test]
    async fn cleanup_zero_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let ctx = OpContext::new();
        {
            let guard = storage.lock_registry("rk", &ctx).await.unwrap();
            for v in ["v1.0.0", "v2.0.0"] {
                guard
                    .set_package_version("pk", &pkg(), &Version::tag(v), &[File::new("a.yml", b"a".to_vec())])
                    .unwrap();
            }
        }

        let report = storage.cleanup(Duration::ZERO, &ctx).await.unwrap();
        assert_eq!(report.versions_removed, 2);
        assert_eq!(report.packages_removed, 1);
        assert!(!dir.path().join("storage/registries/rk/packages/pk").exists());
    }

    #[tokio::test]
    async fn cleanup_keeps_recent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let ctx = OpContext::new();
        {
            let guard = storage.lock_registry("rk", &ctx).await.unwrap();
            guard
                .set_package_version("pk", &pkg(), &Version::tag("v1.0.0"), &[File::new("a.yml", b"a".to_vec())])
                .unwrap();
        }
        let report = storage.cleanup(Duration::from_secs(3600), &ctx).await.unwrap();
        assert_eq!(report, CleanupReport::default());
    }

    #[tokio::test]
    async fn nuke_removes_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        drop(storage.lock_registry("rk", &OpContext::new()).await.unwrap());
        assert!(storage.root().exists());
        storage.nuke().unwrap();
        assert!(!storage.root().exists());
    }

    #[test]
    fn safe_join_rejects_traversal() {
        let root = Path::new("/tmp/r");
        assert!(safe_join(root, "../etc/passwd").is_err());
        assert!(safe_join(root, "/abs").is_err());
        assert_eq!(safe_join(root, "a/b.yml").unwrap(), root.join("a/b.yml"));
    }
}
