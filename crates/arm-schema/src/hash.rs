//! Canonical cache keys and content digests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::ContentSelector;

/// Newtype for a SHA256 hash string (64 hex characters).
///
/// Used for cache keys and per-file content digests. Primarily produced by
/// [`Sha256Hash::compute`]; deserialized values are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Create a new `Sha256Hash` without validation (for index/deserialized data).
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Compute the SHA256 of `data` as lowercase hex.
    pub fn compute(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Create a validated `Sha256Hash` (64 hex characters).
    ///
    /// # Errors
    ///
    /// Returns an error string if `s` is not exactly 64 ASCII hex characters.
    pub fn validated(s: &str) -> Result<Self, String> {
        if s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_lowercase()))
        } else {
            Err(format!(
                "Invalid SHA256 hash: expected 64 hex chars, got '{s}'"
            ))
        }
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` hex characters, used for short on-disk names.
    pub fn prefix(&self, n: usize) -> &str {
        &self.0[..n.min(self.0.len())]
    }
}

impl std::fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Sha256Hash {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Integrity pin stored in the lockfile: `sha256-<hex>`.
///
/// An empty value is legal and means "not yet recorded"; older lockfiles
/// carry it and it never triggers a mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Integrity(String);

impl Integrity {
    /// Prefix carried by every non-empty integrity string.
    pub const PREFIX: &'static str = "sha256-";

    /// Wrap a digest produced by [`crate::integrity_of`].
    pub fn from_hex(hex: &str) -> Self {
        Self(format!("{}{hex}", Self::PREFIX))
    }

    /// Wrap a raw string read from a lockfile.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Whether no integrity was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The full `sha256-...` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Integrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let trimmed = lowered.trim_end_matches('/');
    trimmed.strip_suffix(".git").unwrap_or(trimmed).to_string()
}

/// Cache key for a registry: SHA256 over the normalized URL followed by the
/// lowercased registry type.
///
/// Normalization lowercases and drops trailing `/` and `.git`, so
/// `https://h/p/`, `https://h/p` and `https://h/p.git` share a key.
pub fn registry_key(url: &str, registry_type: &str) -> Sha256Hash {
    let mut input = normalize_url(url);
    input.push_str(&registry_type.to_lowercase());
    Sha256Hash::compute(input.as_bytes())
}

/// Cache key for a package selector. Pattern order does not affect the key.
pub fn package_key(selector: &ContentSelector) -> Sha256Hash {
    let sorted = |patterns: &[String]| {
        let mut v: Vec<String> = patterns.iter().map(|p| p.replace('\\', "/")).collect();
        v.sort();
        v.join(",")
    };

    let mut input = sorted(&selector.include);
    if !selector.exclude.is_empty() {
        input.push('|');
        input.push_str(&sorted(&selector.exclude));
    }
    Sha256Hash::compute(input.as_bytes())
}

/// Key over any serializable value, using JSON with object keys sorted.
///
/// # Errors
///
/// Returns an error if `value` cannot be represented as JSON.
pub fn generic_key<T: Serialize>(value: &T) -> Result<Sha256Hash, serde_json::Error> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(Sha256Hash::compute(&bytes))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn registry_key_is_64_lowercase_hex() {
        let key = registry_key("https://github.com/org/rules", "git");
        assert_eq!(key.as_str().len(), 64);
        assert!(
            key.as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn registry_key_normalizes_url_and_type() {
        let a = registry_key("https://h/p/", "GIT");
        let b = registry_key("https://h/p", "git");
        let c = registry_key("https://h/p.git", "git");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_ne!(b, registry_key("https://h/p", "gitlab"));
    }

    #[test]
    fn package_key_ignores_pattern_order() {
        let a = ContentSelector::new(vec!["b/**".into(), "a/**".into()], vec![]);
        let b = ContentSelector::new(vec!["a/**".into(), "b/**".into()], vec![]);
        assert_eq!(package_key(&a), package_key(&b));
    }

    #[test]
    fn package_key_distinguishes_excludes() {
        let a = ContentSelector::new(vec!["**/*.yml".into()], vec![]);
        let b = ContentSelector::new(vec!["**/*.yml".into()], vec!["tests/**".into()]);
        assert_ne!(package_key(&a), package_key(&b));
    }

    #[test]
    fn generic_key_is_independent_of_insertion_order() {
        let mut first = serde_json::Map::new();
        first.insert("b".into(), Value::from(1));
        first.insert("a".into(), Value::from(2));
        let mut second = BTreeMap::new();
        second.insert("a", 2);
        second.insert("b", 1);

        assert_eq!(
            generic_key(&Value::Object(first)).unwrap(),
            generic_key(&second).unwrap()
        );
    }

    #[test]
    fn integrity_prefix() {
        let i = Integrity::from_hex("abc");
        assert_eq!(i.as_str(), "sha256-abc");
        assert!(Integrity::default().is_empty());
    }
}
