//! Core data model shared by every pipeline stage.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

/// A logical file flowing through the pipeline.
///
/// `path` is always forward-slash separated; backslashes are normalized on
/// construction so Windows renderings compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Path relative to the package root, `/`-separated.
    pub path: String,
    /// Raw bytes.
    pub content: Vec<u8>,
    /// Length of `content` in bytes.
    pub size: u64,
}

impl File {
    /// Build a file, normalizing the path separator.
    pub fn new(path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            path: normalize_path(path.as_ref()),
            size: content.len() as u64,
            content,
        }
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Directory part of the path (empty for top-level files).
    pub fn dir(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }
}

/// Convert `\` to `/` and drop leading `./` and `/`.
pub fn normalize_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let mut s = replaced.as_str();
    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest;
        } else if let Some(rest) = s.strip_prefix('/') {
            s = rest;
        } else {
            break;
        }
    }
    s.to_string()
}

/// Include/exclude glob filter deciding which files belong to a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSelector {
    /// Patterns a path must match (any). Empty means "everything".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Patterns that reject an otherwise included path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn glob_matches(pattern: &str, path: &str) -> bool {
    let pattern = pattern.replace('\\', "/");
    match Pattern::new(&pattern) {
        Ok(p) => p.matches_with(path, MATCH_OPTIONS),
        // Not a valid glob: fall back to a literal comparison.
        Err(_) => pattern == path,
    }
}

impl ContentSelector {
    /// Build a selector from include and exclude patterns.
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Whether `path` belongs to the package.
    ///
    /// Both `path` and the patterns are compared after converting `\` to
    /// `/`, so the outcome does not depend on the platform rendering.
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| glob_matches(p, &path))
            && !self.exclude.iter().any(|p| glob_matches(p, &path))
    }

    /// Check that every pattern is a valid glob.
    ///
    /// # Errors
    ///
    /// Returns the first invalid pattern together with the parser message.
    pub fn validate(&self) -> Result<(), String> {
        for p in self.include.iter().chain(&self.exclude) {
            Pattern::new(&p.replace('\\', "/")).map_err(|e| format!("invalid glob '{p}': {e}"))?;
        }
        Ok(())
    }
}

/// Which canonical resource type a dependency installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A collection of rules.
    #[default]
    Ruleset,
    /// A collection of prompts.
    Promptset,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ruleset => "ruleset",
            Self::Promptset => "promptset",
        })
    }
}

/// AI tool a sink compiles for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Cursor `.mdc` rules with YAML frontmatter.
    Cursor,
    /// Amazon Q plain markdown rules.
    #[serde(rename = "amazonq")]
    AmazonQ,
    /// GitHub Copilot `.instructions.md` files.
    Copilot,
    /// Generic markdown.
    Markdown,
}

impl Tool {
    /// Parse a CLI value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cursor" => Some(Self::Cursor),
            "amazonq" => Some(Self::AmazonQ),
            "copilot" => Some(Self::Copilot),
            "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Extension (without leading dot) used for compiled rules.
    pub fn rule_extension(self) -> &'static str {
        match self {
            Self::Cursor => "mdc",
            Self::AmazonQ | Self::Markdown => "md",
            Self::Copilot => "instructions.md",
        }
    }

    /// Layout used when a sink does not declare one.
    pub fn default_layout(self) -> Layout {
        match self {
            Self::Copilot => Layout::Flat,
            _ => Layout::Hierarchical,
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cursor => "cursor",
            Self::AmazonQ => "amazonq",
            Self::Copilot => "copilot",
            Self::Markdown => "markdown",
        })
    }
}

/// How compiled files are organized inside a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `<sink>/arm/<registry>/<package>/<version>/...`
    Hierarchical,
    /// `<sink>/arm_<hash8>_<name>`
    Flat,
}

impl Layout {
    /// Parse a CLI value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hierarchical" => Some(Self::Hierarchical),
            "flat" => Some(Self::Flat),
            _ => None,
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Hierarchical => "hierarchical",
            Self::Flat => "flat",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(include: &[&str], exclude: &[&str]) -> ContentSelector {
        ContentSelector::new(
            include.iter().map(ToString::to_string).collect(),
            exclude.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn empty_include_matches_everything() {
        let s = sel(&[], &["**/*.md"]);
        assert!(s.matches("README.md"));
        assert!(s.matches("a/b/c.yml"));
    }

    #[test]
    fn include_and_exclude() {
        let s = sel(&["rules/**/*.yml"], &["rules/internal/**"]);
        assert!(s.matches("rules/a.yml"));
        assert!(s.matches("rules/x/y/a.yml"));
        assert!(!s.matches("rules/internal/a.yml"));
        assert!(!s.matches("other/a.yml"));
    }

    #[test]
    fn double_star_matches_top_level() {
        let s = sel(&["**/*.yml"], &[]);
        assert!(s.matches("rule1.yml"));
        assert!(s.matches("test-ruleset/rule1.yml"));
        assert!(!s.matches("test-ruleset/rules.tar.gz"));
    }

    #[test]
    fn separator_insensitive() {
        let unix = "rules\\sub/a.yml";
        for include in ["rules/sub/*.yml", "rules\\sub\\*.yml"] {
            let s = sel(&[include], &[]);
            assert_eq!(s.matches("rules/sub/a.yml"), s.matches(unix));
            assert!(s.matches(unix));
        }
    }

    #[test]
    fn file_normalizes_path() {
        let f = File::new(".\\dir\\a.yml", b"x".to_vec());
        assert_eq!(f.path, "dir/a.yml");
        assert_eq!(f.file_name(), "a.yml");
        assert_eq!(f.dir(), "dir");
        assert_eq!(f.size, 1);
    }

    #[test]
    fn tool_extensions() {
        assert_eq!(Tool::Cursor.rule_extension(), "mdc");
        assert_eq!(Tool::Copilot.rule_extension(), "instructions.md");
        assert_eq!(Tool::parse("AmazonQ"), Some(Tool::AmazonQ));
        assert_eq!(Tool::Copilot.default_layout(), Layout::Flat);
    }
}
