//! Project files: `arm.json` (manifest) and `arm-lock.json` (lockfile).
//!
//! Missing files read as empty documents. Writes create the parent
//! directory, pretty-print with two-space indentation and rewrite the
//! whole file. Unknown top-level manifest fields survive a round trip.

use std::collections::BTreeMap;
use std::path::Path;

use arm_schema::{ContentSelector, Integrity, Layout, ResourceKind, Tool};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{ArmError, Result};
use crate::registry::RegistryConfig;
use crate::storage::index::write_json;

/// Current lockfile schema version.
pub const LOCKFILE_VERSION: u32 = 1;

/// A sink entry in `arm.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub directory: String,
    pub tool: Tool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
}

impl SinkConfig {
    /// Declared layout, or the tool's default.
    pub fn layout(&self) -> Layout {
        self.layout.unwrap_or_else(|| self.tool.default_layout())
    }

    /// Update one field by name.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        match field.to_lowercase().as_str() {
            "directory" | "dir" => {
                if value.trim().is_empty() {
                    return Err(ArmError::config("sink directory must not be empty"));
                }
                self.directory = value.to_string();
            }
            "tool" => {
                self.tool = Tool::parse(value)
                    .ok_or_else(|| ArmError::config(format!("unknown tool '{value}'")))?;
            }
            "layout" => {
                self.layout = Some(
                    Layout::parse(value)
                        .ok_or_else(|| ArmError::config(format!("unknown layout '{value}'")))?,
                );
            }
            _ => return Err(ArmError::config(format!("unknown field '{field}' for sink"))),
        }
        Ok(())
    }
}

/// A dependency entry keyed by `<registry>/<package>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default)]
    pub sinks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub kind: ResourceKind,
}

impl Dependency {
    pub fn selector(&self) -> ContentSelector {
        ContentSelector::new(self.include.clone(), self.exclude.clone())
    }

    /// Priority with the package default applied.
    pub fn effective_priority(&self) -> i64 {
        self.priority.unwrap_or(arm_schema::DEFAULT_PACKAGE_PRIORITY)
    }

    /// Add sinks not already listed, keeping order.
    pub fn merge_sinks(&mut self, sinks: &[String]) {
        for s in sinks {
            if !self.sinks.contains(s) {
                self.sinks.push(s.clone());
            }
        }
    }
}

/// Split `<registry>/<package>` at the first `/`.
pub fn split_dependency_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('/') {
        Some((reg, pkg)) if !reg.is_empty() && !pkg.is_empty() => Ok((reg, pkg)),
        _ => Err(ArmError::config(format!(
            "invalid package '{key}': expected <registry>/<package>"
        ))),
    }
}

/// `arm.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub registries: BTreeMap<String, RegistryConfig>,
    #[serde(default)]
    pub sinks: BTreeMap<String, SinkConfig>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    pub async fn load(path: &Path) -> Result<Self> {
        Ok(read_document(path).await?.unwrap_or_default())
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        write_document(path, self)
    }

    pub fn add_registry(&mut self, name: &str, config: RegistryConfig, force: bool) -> Result<()> {
        config.validate()?;
        if self.registries.contains_key(name) && !force {
            return Err(ArmError::config(format!(
                "registry '{name}' already exists (use --force to overwrite)"
            )));
        }
        self.registries.insert(name.to_string(), config);
        Ok(())
    }

    /// Remove a registry. Dependencies on it must be removed first.
    pub fn remove_registry(&mut self, name: &str) -> Result<RegistryConfig> {
        let users: Vec<&str> = self
            .dependencies
            .keys()
            .filter(|k| split_dependency_key(k).is_ok_and(|(r, _)| r == name))
            .map(String::as_str)
            .collect();
        if !users.is_empty() {
            return Err(ArmError::config(format!(
                "registry '{name}' is used by {}; uninstall them first",
                users.join(", ")
            )));
        }
        self.registries
            .remove(name)
            .ok_or_else(|| ArmError::config(format!("unknown registry '{name}'")))
    }

    pub fn add_sink(&mut self, name: &str, config: SinkConfig, force: bool) -> Result<()> {
        if self.sinks.contains_key(name) && !force {
            return Err(ArmError::config(format!(
                "sink '{name}' already exists (use --force to overwrite)"
            )));
        }
        self.sinks.insert(name.to_string(), config);
        Ok(())
    }

    /// Remove a sink. Fails while any dependency still installs into it.
    pub fn remove_sink(&mut self, name: &str) -> Result<SinkConfig> {
        let users: Vec<&str> = self
            .dependencies
            .iter()
            .filter(|(_, d)| d.sinks.iter().any(|s| s == name))
            .map(|(k, _)| k.as_str())
            .collect();
        if !users.is_empty() {
            return Err(ArmError::config(format!(
                "sink '{name}' is referenced by {}; uninstall them first",
                users.join(", ")
            )));
        }
        self.sinks
            .remove(name)
            .ok_or_else(|| ArmError::config(format!("unknown sink '{name}'")))
    }

    pub fn registry(&self, name: &str) -> Result<&RegistryConfig> {
        self.registries
            .get(name)
            .ok_or_else(|| ArmError::config(format!("unknown registry '{name}'")))
    }

    pub fn sink(&self, name: &str) -> Result<&SinkConfig> {
        self.sinks
            .get(name)
            .ok_or_else(|| ArmError::config(format!("unknown sink '{name}'")))
    }

    pub fn set_registry_field(&mut self, name: &str, field: &str, value: &str) -> Result<()> {
        let mut updated = self.registry(name)?.clone();
        updated.set_field(field, value)?;
        self.registries.insert(name.to_string(), updated);
        Ok(())
    }

    pub fn set_sink_field(&mut self, name: &str, field: &str, value: &str) -> Result<()> {
        let mut updated = self.sink(name)?.clone();
        updated.set_field(field, value)?;
        self.sinks.insert(name.to_string(), updated);
        Ok(())
    }

    /// Insert or update a dependency; sink lists are merged.
    pub fn upsert_dependency(&mut self, key: &str, dep: Dependency) {
        match self.dependencies.get_mut(key) {
            Some(existing) => {
                let sinks = std::mem::take(&mut existing.sinks);
                *existing = dep;
                let added = std::mem::replace(&mut existing.sinks, sinks);
                existing.merge_sinks(&added);
            }
            None => {
                self.dependencies.insert(key.to_string(), dep);
            }
        }
    }
}

/// A lock entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    #[serde(default)]
    pub integrity: Integrity,
}

/// `arm-lock.json`: `<registry>/<package>@<version>` → integrity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    #[serde(default)]
    pub dependencies: BTreeMap<String, LockEntry>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            dependencies: BTreeMap::new(),
        }
    }
}

/// A dependency's locked version and integrity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locked {
    pub version: String,
    pub integrity: Integrity,
}

impl Lockfile {
    pub async fn load(path: &Path) -> Result<Self> {
        Ok(read_document(path).await?.unwrap_or_default())
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        write_document(path, self)
    }

    pub fn key(dependency: &str, version: &str) -> String {
        format!("{dependency}@{version}")
    }

    /// Locked version of `dependency` (`<registry>/<package>`).
    pub fn find(&self, dependency: &str) -> Option<Locked> {
        self.dependencies.iter().find_map(|(k, e)| {
            let (dep, version) = k.rsplit_once('@')?;
            (dep == dependency).then(|| Locked {
                version: version.to_string(),
                integrity: e.integrity.clone(),
            })
        })
    }

    /// Record `dependency@version`, dropping any other locked version of it.
    pub fn upsert(&mut self, dependency: &str, version: &str, integrity: Integrity) {
        self.remove(dependency);
        self.dependencies
            .insert(Self::key(dependency, version), LockEntry { integrity });
    }

    /// Remove every entry for `dependency`. Returns whether any existed.
    pub fn remove(&mut self, dependency: &str) -> bool {
        let before = self.dependencies.len();
        self.dependencies
            .retain(|k, _| k.rsplit_once('@').is_none_or(|(d, _)| d != dependency));
        before != self.dependencies.len()
    }
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => {
            let doc = serde_json::from_slice(&bytes)
                .map_err(|e| ArmError::parse(path.display().to_string(), e))?;
            debug!(path = %path.display(), "loaded");
            Ok(Some(doc))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_json(path, value)?;
    debug!(path = %path.display(), "saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn git(url: &str) -> RegistryConfig {
        RegistryConfig::Git {
            url: url.into(),
            branches: vec![],
        }
    }

    fn dep(version: &str, sinks: &[&str]) -> Dependency {
        Dependency {
            version: version.into(),
            priority: None,
            sinks: sinks.iter().map(|s| (*s).to_string()).collect(),
            include: vec![],
            exclude: vec![],
            kind: ResourceKind::Ruleset,
        }
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let m = Manifest::load(&dir.path().join("arm.json")).await.unwrap();
        assert_eq!(m, Manifest::default());
        let l = Lockfile::load(&dir.path().join("arm-lock.json")).await.unwrap();
        assert_eq!(l.version, LOCKFILE_VERSION);
        assert!(l.dependencies.is_empty());
    }

    #[tokio::test]
    async fn unknown_fields_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arm.json");
        std::fs::write(
            &path,
            r#"{"$comment": "keep me", "registries": {}, "future": {"x": 1}}"#,
        )
        .unwrap();

        let mut m = Manifest::load(&path).await.unwrap();
        m.add_registry("r", git("https://h/r"), false).unwrap();
        m.save(&path).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["$comment"], "keep me");
        assert_eq!(raw["future"]["x"], 1);
        assert_eq!(raw["registries"]["r"]["type"], "git");
        assert!(std::fs::read_to_string(&path).unwrap().contains("\n  \"registries\""));
    }

    #[tokio::test]
    async fn lock_save_replaces_file_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arm-lock.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let mut lock = Lockfile::default();
        lock.upsert("r/p", "v1.0.0", Integrity::new("sha256-ab"));
        lock.save(&path).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["arm-lock.json".to_string()]);
        assert_eq!(Lockfile::load(&path).await.unwrap(), lock);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn duplicate_add_requires_force() {
        let mut m = Manifest::default();
        m.add_registry("r", git("https://h/a"), false).unwrap();
        assert!(m.add_registry("r", git("https://h/b"), false).is_err());
        m.add_registry("r", git("https://h/b"), true).unwrap();
        assert_eq!(m.registries["r"].url(), "https://h/b");
    }

    #[test]
    fn referenced_sink_cannot_be_removed() {
        let mut m = Manifest::default();
        m.add_sink(
            "cursor",
            SinkConfig {
                directory: ".cursor/rules".into(),
                tool: Tool::Cursor,
                layout: None,
            },
            false,
        )
        .unwrap();
        m.upsert_dependency("r/p", dep("1.0.0", &["cursor"]));
        let err = m.remove_sink("cursor").unwrap_err();
        assert!(err.to_string().contains("r/p"));
        m.dependencies.remove("r/p");
        assert!(m.remove_sink("cursor").is_ok());
    }

    #[test]
    fn upsert_merges_sinks() {
        let mut m = Manifest::default();
        m.upsert_dependency("r/p", dep("1.0.0", &["a"]));
        m.upsert_dependency("r/p", dep("^2.0.0", &["b", "a"]));
        let d = &m.dependencies["r/p"];
        assert_eq!(d.version, "^2.0.0");
        assert_eq!(d.sinks, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn sink_set_field_and_default_layout() {
        let mut s = SinkConfig {
            directory: ".github/instructions".into(),
            tool: Tool::Copilot,
            layout: None,
        };
        assert_eq!(s.layout(), Layout::Flat);
        s.set_field("layout", "hierarchical").unwrap();
        assert_eq!(s.layout(), Layout::Hierarchical);
        assert!(s.set_field("color", "red").is_err());
        assert!(s.set_field("tool", "vim").is_err());
    }

    #[test]
    fn lock_upsert_replaces_previous_version() {
        let mut l = Lockfile::default();
        l.upsert("r/p", "v1.1.0", Integrity::new("sha256-a"));
        l.upsert("r/other", "v1.0.0", Integrity::new("sha256-o"));
        l.upsert("r/p", "v2.0.0", Integrity::new("sha256-b"));
        let keys: Vec<&str> = l.dependencies.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["r/other@v1.0.0", "r/p@v2.0.0"]);
        assert_eq!(
            l.find("r/p"),
            Some(Locked {
                version: "v2.0.0".into(),
                integrity: Integrity::new("sha256-b")
            })
        );
        assert!(l.remove("r/p"));
        assert!(!l.remove("r/p"));
    }

    #[test]
    fn lock_entry_without_integrity_parses() {
        let l: Lockfile =
            serde_json::from_str(r#"{"version":1,"dependencies":{"r/p@v1.0.0":{}}}"#).unwrap();
        assert!(l.find("r/p").unwrap().integrity.is_empty());
    }

    #[test]
    fn dependency_key_split() {
        assert_eq!(split_dependency_key("reg/a/b").unwrap(), ("reg", "a/b"));
        assert!(split_dependency_key("noslash").is_err());
    }
}
