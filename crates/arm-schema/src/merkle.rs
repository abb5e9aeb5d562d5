//! Integrity digest over a package's file set.
//!
//! Each file contributes one leaf line `path \0 sha256(content) \0 size \n`.
//! Leaves are sorted before hashing so the digest depends only on the set
//! of files, never on the order an adapter produced them in.

use sha2::{Digest, Sha256};

use crate::hash::{Integrity, Sha256Hash};
use crate::types::{File, normalize_path};

/// Leaf line for a single file.
fn leaf(file: &File) -> String {
    let content_hash = Sha256Hash::compute(&file.content);
    format!(
        "{}\0{}\0{}\n",
        normalize_path(&file.path),
        content_hash.as_str(),
        file.size
    )
}

/// Compute the `sha256-<hex>` integrity of a filtered file set.
pub fn integrity_of(files: &[File]) -> Integrity {
    let mut leaves: Vec<String> = files.iter().map(leaf).collect();
    leaves.sort();

    let mut hasher = Sha256::new();
    for line in &leaves {
        hasher.update(line.as_bytes());
    }
    Integrity::from_hex(&hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<File> {
        vec![
            File::new("rules/a.yml", b"alpha".to_vec()),
            File::new("rules/b.yml", b"beta".to_vec()),
        ]
    }

    #[test]
    fn order_independent() {
        let mut reversed = files();
        reversed.reverse();
        assert_eq!(integrity_of(&files()), integrity_of(&reversed));
    }

    #[test]
    fn single_byte_change_changes_digest() {
        let mut mutated = files();
        mutated[1] = File::new("rules/b.yml", b"betb".to_vec());
        assert_ne!(integrity_of(&files()), integrity_of(&mutated));
    }

    #[test]
    fn path_separator_does_not_matter() {
        let windows = vec![
            File::new("rules\\a.yml", b"alpha".to_vec()),
            File::new("rules\\b.yml", b"beta".to_vec()),
        ];
        assert_eq!(integrity_of(&files()), integrity_of(&windows));
    }

    #[test]
    fn has_prefix_and_hex_body() {
        let i = integrity_of(&files());
        let body = i.as_str().strip_prefix("sha256-").unwrap();
        assert_eq!(body.len(), 64);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn empty_set_is_stable() {
        assert_eq!(integrity_of(&[]), integrity_of(&[]));
    }
}
