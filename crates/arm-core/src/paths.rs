use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Project manifest filename.
pub const MANIFEST_FILE: &str = "arm.json";

/// Project lockfile filename.
pub const LOCK_FILE: &str = "arm-lock.json";

/// Sink index filename.
pub const SINK_INDEX_FILE: &str = "arm-index.json";

/// Stem of the human-readable priority index (`arm_index.<ext>`).
pub const PRIORITY_INDEX_STEM: &str = "arm_index";

/// Directory created inside hierarchical sinks.
pub const SINK_ARM_DIR: &str = "arm";

/// Returns the cache root, or None if the user's home cannot be resolved.
///
/// `ARM_CACHE_DIR` wins over `$HOME/.arm`.
pub fn try_arm_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("ARM_CACHE_DIR") {
        if !val.is_empty() {
            return Some(PathBuf::from(val));
        }
    }
    home_dir().map(|h| h.join(".arm"))
}

/// Storage root: `<cache>/storage`
pub fn storage_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("storage")
}

/// Make a single path component safe for the filesystem.
///
/// Version strings may contain `/` (e.g. `release/1.0` tags); those must
/// not create nested directories.
pub fn fs_safe(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_layout() {
        let root = Path::new("/tmp/x");
        assert_eq!(storage_path(root), Path::new("/tmp/x/storage"));
    }

    #[test]
    fn fs_safe_replaces_separators() {
        assert_eq!(fs_safe("release/1.0"), "release_1.0");
        assert_eq!(fs_safe("v1.0.0"), "v1.0.0");
    }
}
