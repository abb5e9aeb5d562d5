//! Per-registry bookkeeping: identity metadata and access timestamps.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;

use arm_schema::{ContentSelector, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::{ArmError, Result};

/// Creation, update and access times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub created_on: DateTime<Utc>,
    pub last_updated_on: DateTime<Utc>,
    pub last_accessed_on: DateTime<Utc>,
}

impl Timestamps {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            created_on: now,
            last_updated_on: now,
            last_accessed_on: now,
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn touch_access(&mut self, now: DateTime<Utc>) {
        self.last_accessed_on = now;
    }

    pub fn touch_update(&mut self, now: DateTime<Utc>) {
        self.last_updated_on = now;
        self.last_accessed_on = now;
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::now()
    }
}

/// Identity of a cached registry (`registries/<rkey>/metadata.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMetadata {
    pub url: String,
    #[serde(rename = "type")]
    pub registry_type: String,
}

/// Identity of a cached package selector (`packages/<pkey>/metadata.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(flatten)]
    pub selector: ContentSelector,
}

/// A cached version (`packages/<pkey>/<version>/metadata.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub version: Version,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Package entry in the registry index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(default)]
    pub versions: BTreeMap<String, Timestamps>,
}

/// `registries/<rkey>/index.json`: timestamps at registry, package and
/// version level. Eviction decisions are made from this file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageIndex {
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(default)]
    pub packages: BTreeMap<String, PackageEntry>,
}

impl StorageIndex {
    /// Record that `version` of `pkey` was written.
    pub fn record_update(&mut self, pkey: &str, version: &str, now: DateTime<Utc>) {
        self.timestamps.touch_update(now);
        let pkg = self
            .packages
            .entry(pkey.to_string())
            .or_insert_with(|| PackageEntry {
                timestamps: Timestamps::at(now),
                versions: BTreeMap::new(),
            });
        pkg.timestamps.touch_update(now);
        pkg.versions
            .entry(version.to_string())
            .and_modify(|t| t.touch_update(now))
            .or_insert_with(|| Timestamps::at(now));
    }

    /// Record that `version` of `pkey` was read.
    pub fn record_access(&mut self, pkey: &str, version: &str, now: DateTime<Utc>) {
        self.timestamps.touch_access(now);
        if let Some(pkg) = self.packages.get_mut(pkey) {
            pkg.timestamps.touch_access(now);
            if let Some(v) = pkg.versions.get_mut(version) {
                v.touch_access(now);
            }
        }
    }

    /// Remove a version; drops the package entry once it has none left.
    pub fn remove_version(&mut self, pkey: &str, version: &str) {
        if let Some(pkg) = self.packages.get_mut(pkey) {
            pkg.versions.remove(version);
            if pkg.versions.is_empty() {
                self.packages.remove(pkey);
            }
        }
    }

    /// `(pkey, version)` pairs last accessed at least `max_age` before `now`.
    pub fn stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> Vec<(String, String)> {
        self.packages
            .iter()
            .flat_map(|(pkey, pkg)| {
                pkg.versions
                    .iter()
                    .filter(move |(_, t)| now - t.last_accessed_on >= max_age)
                    .map(move |(v, _)| (pkey.clone(), v.clone()))
            })
            .collect()
    }
}

/// Read a JSON document, `None` if the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ArmError::parse(path.display().to_string(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write pretty JSON through a sibling temp file and rename, leaving the
/// file world-readable (0644).
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => return Err(ArmError::config(format!("no parent for {}", path.display()))),
    };
    std::fs::create_dir_all(dir)?;
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    tmp.persist(path).map_err(|e| ArmError::Io(e.error))?;
    Ok(())
}
