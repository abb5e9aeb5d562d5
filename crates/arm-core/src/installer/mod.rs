//! Materialize compiled packages into sink directories.
//!
//! The installer owns every file it writes under a sink. Installing a
//! package first removes whatever version of it was there, writes the new
//! files, and only then updates the sink index. Uninstalling removes the
//! files and every directory left empty, up to but never including the
//! sink root.

pub mod index;

use std::path::{Path, PathBuf};

use arm_schema::{File, Layout, Sha256Hash, Tool};
use tracing::{debug, info};

use crate::compiler::Namespace;
use crate::error::Result;
use crate::paths::{self, SINK_ARM_DIR, SINK_INDEX_FILE};
use crate::storage::index::{read_json, write_json};
use crate::storage::safe_join;
pub use index::{PromptsetEntry, RulesetEntry, SinkIndex};

/// A ruleset as recorded in a sink index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRuleset {
    pub registry: String,
    pub package: String,
    pub version: String,
    pub priority: i64,
    pub file_paths: Vec<String>,
}

/// A promptset as recorded in a sink index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPromptset {
    pub registry: String,
    pub package: String,
    pub version: String,
    pub file_paths: Vec<String>,
}

/// Installer bound to one sink directory.
#[derive(Debug, Clone)]
pub struct Installer {
    root: PathBuf,
    tool: Tool,
    layout: Layout,
}

impl Installer {
    pub fn new(root: impl Into<PathBuf>, tool: Tool, layout: Layout) -> Self {
        Self {
            root: root.into(),
            tool,
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_dir(&self) -> PathBuf {
        match self.layout {
            Layout::Hierarchical => self.root.join(SINK_ARM_DIR),
            Layout::Flat => self.root.clone(),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.index_dir().join(SINK_INDEX_FILE)
    }

    pub fn priority_index_path(&self) -> PathBuf {
        self.index_dir().join(index::priority_index_filename(self.tool))
    }

    /// Current sink index; empty when the sink has none.
    pub fn load_index(&self) -> Result<SinkIndex> {
        Ok(read_json(&self.index_path())?.unwrap_or_default())
    }

    /// Persist `idx` and regenerate or delete the priority index.
    fn save_index(&self, idx: &SinkIndex) -> Result<()> {
        let index_path = self.index_path();
        if idx.is_empty() {
            remove_if_exists(&index_path)?;
        } else {
            write_json(&index_path, idx)?;
        }

        let priority_path = self.priority_index_path();
        if idx.has_rulesets() {
            std::fs::write(&priority_path, index::render_priority_index(self.tool, idx))?;
        } else {
            remove_if_exists(&priority_path)?;
        }

        if let Some(dir) = index_path.parent() {
            self.prune_empty_dirs(dir)?;
        }
        Ok(())
    }

    /// Sink-relative path of a compiled file.
    pub fn placement(&self, ns: &Namespace, compiled_path: &str) -> String {
        match self.layout {
            Layout::Hierarchical => format!(
                "{SINK_ARM_DIR}/{}/{}/{}/{compiled_path}",
                ns.registry,
                ns.package,
                paths::fs_safe(&ns.version)
            ),
            Layout::Flat => {
                let hash = Sha256Hash::compute(format!("{ns}:{compiled_path}").as_bytes());
                format!("arm_{}_{}", hash.prefix(8), compiled_path.replace('/', "_"))
            }
        }
    }

    /// Remove files by sink-relative path and prune emptied directories.
    fn remove_files(&self, rel_paths: &[String]) -> Result<()> {
        for rel in rel_paths {
            let path = safe_join(&self.root, rel)?;
            remove_if_exists(&path)?;
            if let Some(parent) = path.parent() {
                self.prune_empty_dirs(parent)?;
            }
        }
        Ok(())
    }

    /// Delete `start` and its ancestors while empty, stopping at the root.
    fn prune_empty_dirs(&self, start: &Path) -> Result<()> {
        let mut dir = start.to_path_buf();
        while dir != self.root && dir.starts_with(&self.root) {
            match std::fs::read_dir(&dir) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        break;
                    }
                    std::fs::remove_dir(&dir)?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            match dir.parent() {
                Some(p) => dir = p.to_path_buf(),
                None => break,
            }
        }
        Ok(())
    }

    fn write_files(&self, ns: &Namespace, files: &[File]) -> Result<Vec<String>> {
        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let rel = self.placement(ns, &file.path);
            let dest = safe_join(&self.root, &rel)?;
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, &file.content)?;
            written.push(rel);
        }
        written.sort();
        Ok(written)
    }

    fn replace(
        &self,
        ns: &Namespace,
        files: &[File],
        record: impl FnOnce(&mut SinkIndex, Vec<String>),
    ) -> Result<Vec<String>> {
        std::fs::create_dir_all(&self.root)?;
        let mut idx = self.load_index()?;
        let previous = idx.remove(&ns.registry, &ns.package);
        self.remove_files(&previous)?;

        let written = self.write_files(ns, files)?;
        record(&mut idx, written.clone());
        self.save_index(&idx)?;

        info!(package = %ns, sink = %self.root.display(), files = written.len(), "installed");
        Ok(written)
    }

    /// Install compiled ruleset files; returns their sink-relative paths.
    pub fn install_ruleset(&self, ns: &Namespace, priority: i64, files: &[File]) -> Result<Vec<String>> {
        let version = ns.version.clone();
        self.replace(ns, files, |idx, file_paths| {
            idx.insert_ruleset(
                &ns.registry,
                &ns.package,
                RulesetEntry {
                    version,
                    priority,
                    file_paths,
                },
            );
        })
    }

    /// Install compiled promptset files; returns their sink-relative paths.
    pub fn install_promptset(&self, ns: &Namespace, files: &[File]) -> Result<Vec<String>> {
        let version = ns.version.clone();
        self.replace(ns, files, |idx, file_paths| {
            idx.insert_promptset(&ns.registry, &ns.package, PromptsetEntry { version, file_paths });
        })
    }

    /// Remove a package. Returns false when it was not installed.
    pub fn uninstall(&self, registry: &str, package: &str) -> Result<bool> {
        let mut idx = self.load_index()?;
        if !idx.contains(registry, package) {
            debug!(registry, package, sink = %self.root.display(), "not installed");
            return Ok(false);
        }
        let paths = idx.remove(registry, package);
        self.remove_files(&paths)?;
        self.save_index(&idx)?;
        info!(registry, package, sink = %self.root.display(), files = paths.len(), "uninstalled");
        Ok(true)
    }

    pub fn list_rulesets(&self) -> Result<Vec<InstalledRuleset>> {
        let idx = self.load_index()?;
        Ok(idx
            .rulesets
            .into_iter()
            .flat_map(|(registry, pkgs)| {
                pkgs.into_iter().map(move |(package, e)| InstalledRuleset {
                    registry: registry.clone(),
                    package,
                    version: e.version,
                    priority: e.priority,
                    file_paths: e.file_paths,
                })
            })
            .collect())
    }

    pub fn list_promptsets(&self) -> Result<Vec<InstalledPromptset>> {
        let idx = self.load_index()?;
        Ok(idx
            .promptsets
            .into_iter()
            .flat_map(|(registry, pkgs)| {
                pkgs.into_iter().map(move |(package, e)| InstalledPromptset {
                    registry: registry.clone(),
                    package,
                    version: e.version,
                    file_paths: e.file_paths,
                })
            })
            .collect())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use walkdir::WalkDir;

    fn ns(package: &str, version: &str) -> Namespace {
        Namespace {
            registry: "reg".into(),
            package: package.into(),
            version: version.into(),
        }
    }

    fn files() -> Vec<File> {
        vec![
            File::new("clean_a.mdc", "a"),
            File::new("docs/guide.md", "g"),
        ]
    }

    fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .map(Result::unwrap)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned(),
                    std::fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn hierarchical_paths_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let inst = Installer::new(dir.path().join(".cursor/rules"), Tool::Cursor, Layout::Hierarchical);
        let written = inst.install_ruleset(&ns("pkg", "v1.0.0"), 100, &files()).unwrap();
        assert_eq!(
            written,
            vec![
                "arm/reg/pkg/v1.0.0/clean_a.mdc".to_string(),
                "arm/reg/pkg/v1.0.0/docs/guide.md".to_string()
            ]
        );
        assert!(inst.root().join("arm/reg/pkg/v1.0.0/clean_a.mdc").is_file());
        assert!(inst.root().join("arm/arm-index.json").is_file());
        assert!(inst.root().join("arm/arm_index.mdc").is_file());

        let listed = inst.list_rulesets().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].priority, 100);
    }

    #[test]
    fn flat_names_are_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let inst = Installer::new(dir.path(), Tool::Copilot, Layout::Flat);
        let n = ns("pkg", "v1.0.0");
        let written = inst.install_ruleset(&n, 100, &files()).unwrap();

        let expected_hash = Sha256Hash::compute(b"reg/pkg@v1.0.0:docs/guide.md");
        let guide = format!("arm_{}_docs_guide.md", expected_hash.prefix(8));
        assert!(written.contains(&guide));
        assert!(dir.path().join(&guide).is_file());
        assert!(dir.path().join("arm-index.json").is_file());
        assert!(dir.path().join("arm_index.instructions.md").is_file());
        assert!(!dir.path().join("arm").exists());
    }

    #[test]
    fn reinstall_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let inst = Installer::new(dir.path(), Tool::Cursor, Layout::Hierarchical);
        inst.install_ruleset(&ns("pkg", "v1.0.0"), 100, &files()).unwrap();
        let first = snapshot(dir.path());
        inst.install_ruleset(&ns("pkg", "v1.0.0"), 100, &files()).unwrap();
        assert_eq!(snapshot(dir.path()), first);
    }

    #[test]
    fn new_version_replaces_old() {
        let dir = tempfile::tempdir().unwrap();
        let inst = Installer::new(dir.path(), Tool::Cursor, Layout::Hierarchical);
        inst.install_ruleset(&ns("pkg", "v1.0.0"), 100, &files()).unwrap();
        inst.install_ruleset(&ns("pkg", "v2.0.0"), 100, &files()).unwrap();
        assert!(!dir.path().join("arm/reg/pkg/v1.0.0").exists());
        assert!(dir.path().join("arm/reg/pkg/v2.0.0/clean_a.mdc").is_file());
    }

    #[test]
    fn uninstall_last_package_cleans_sink() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sink");
        let inst = Installer::new(&root, Tool::Cursor, Layout::Hierarchical);
        inst.install_ruleset(&ns("a", "v1.0.0"), 50, &files()).unwrap();
        inst.install_promptset(&ns("p", "v1.0.0"), &[File::new("x_y.md", "y")]).unwrap();

        assert!(inst.uninstall("reg", "a").unwrap());
        assert!(!root.join("arm/arm_index.mdc").exists());
        assert!(root.join("arm/arm-index.json").exists());

        assert!(inst.uninstall("reg", "p").unwrap());
        assert!(root.is_dir());
        assert!(!root.join("arm").exists());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn uninstall_unknown_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let inst = Installer::new(dir.path(), Tool::Markdown, Layout::Hierarchical);
        assert!(!inst.uninstall("reg", "nope").unwrap());
    }

    #[test]
    fn flat_uninstall_leaves_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user.md"), "mine").unwrap();
        let inst = Installer::new(dir.path(), Tool::Copilot, Layout::Flat);
        inst.install_ruleset(&ns("pkg", "v1.0.0"), 100, &files()).unwrap();
        inst.uninstall("reg", "pkg").unwrap();
        let left: Vec<_> = snapshot(dir.path()).into_iter().map(|(p, _)| p).collect();
        assert_eq!(left, vec!["user.md".to_string()]);
    }
}
