//! Canonical resource model: `Ruleset` and `Promptset` documents.
//!
//! These are the YAML files authors keep in their registries. Parsing lives
//! in `arm-core`; this module owns the shapes and their validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DEFAULT_RULE_PRIORITY;

/// Validation failures for a resource document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A required field was missing or empty.
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// `kind` does not match the document shape.
    #[error("expected kind '{expected}', found '{found}'")]
    WrongKind {
        /// Kind implied by the structure.
        expected: &'static str,
        /// Kind written in the document.
        found: String,
    },
}

/// How strongly a rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// Optional guidance.
    May,
    /// Recommended.
    Should,
    /// Mandatory; Cursor applies these on every request.
    Must,
}

impl Enforcement {
    /// Lowercase name as written in YAML.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::May => "may",
            Self::Should => "should",
            Self::Must => "must",
        }
    }
}

/// Identity block shared by rulesets and promptsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Stable identifier, used in compiled filenames.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Metadata {
    fn validate(&self) -> Result<(), ResourceError> {
        if self.id.trim().is_empty() {
            return Err(ResourceError::MissingField("metadata.id".into()));
        }
        if self.name.trim().is_empty() {
            return Err(ResourceError::MissingField("metadata.name".into()));
        }
        Ok(())
    }
}

/// File globs a rule targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Glob patterns.
    #[serde(default)]
    pub files: Vec<String>,
}

/// A single rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Display name.
    pub name: String,
    /// Optional summary, used as Cursor's `description`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordering weight; higher wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// Strength; absent means no label is emitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<Enforcement>,
    /// Target file globs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<Scope>,
    /// Instruction text.
    pub body: String,
}

impl Rule {
    /// Priority with the default applied.
    pub fn effective_priority(&self) -> i64 {
        self.priority.unwrap_or(DEFAULT_RULE_PRIORITY)
    }

    /// Globs of the first scope entry, if any.
    pub fn primary_globs(&self) -> &[String] {
        self.scope.first().map_or(&[], |s| s.files.as_slice())
    }
}

/// `spec` section of a ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetSpec {
    /// Rules keyed by rule ID.
    pub rules: BTreeMap<String, Rule>,
}

/// A `kind: Ruleset` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ruleset {
    /// Schema version, e.g. `v1`.
    pub api_version: String,
    /// Always `Ruleset`.
    pub kind: String,
    /// Identity.
    pub metadata: Metadata,
    /// Rules.
    pub spec: RulesetSpec,
}

impl Ruleset {
    /// Expected `kind` value.
    pub const KIND: &'static str = "Ruleset";

    /// Check required fields and the `kind` discriminator.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ResourceError> {
        validate_header(&self.api_version, &self.kind, Self::KIND)?;
        self.metadata.validate()?;
        for (id, rule) in &self.spec.rules {
            if rule.name.trim().is_empty() {
                return Err(ResourceError::MissingField(format!("spec.rules.{id}.name")));
            }
            if rule.body.trim().is_empty() {
                return Err(ResourceError::MissingField(format!("spec.rules.{id}.body")));
            }
        }
        Ok(())
    }

    /// Rule IDs in sorted order.
    pub fn rule_ids(&self) -> Vec<String> {
        self.spec.rules.keys().cloned().collect()
    }
}

/// A single prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Display name.
    pub name: String,
    /// Optional summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Prompt text.
    pub body: String,
}

/// `spec` section of a promptset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptsetSpec {
    /// Prompts keyed by prompt ID.
    pub prompts: BTreeMap<String, Prompt>,
}

/// A `kind: Promptset` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promptset {
    /// Schema version, e.g. `v1`.
    pub api_version: String,
    /// Always `Promptset`.
    pub kind: String,
    /// Identity.
    pub metadata: Metadata,
    /// Prompts.
    pub spec: PromptsetSpec,
}

impl Promptset {
    /// Expected `kind` value.
    pub const KIND: &'static str = "Promptset";

    /// Check required fields and the `kind` discriminator.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ResourceError> {
        validate_header(&self.api_version, &self.kind, Self::KIND)?;
        self.metadata.validate()?;
        for (id, prompt) in &self.spec.prompts {
            if prompt.name.trim().is_empty() {
                return Err(ResourceError::MissingField(format!("spec.prompts.{id}.name")));
            }
            if prompt.body.trim().is_empty() {
                return Err(ResourceError::MissingField(format!("spec.prompts.{id}.body")));
            }
        }
        Ok(())
    }
}

fn validate_header(api_version: &str, kind: &str, expected: &'static str) -> Result<(), ResourceError> {
    if api_version.trim().is_empty() {
        return Err(ResourceError::MissingField("apiVersion".into()));
    }
    if kind != expected {
        return Err(ResourceError::WrongKind {
            expected,
            found: kind.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, body: &str) -> Rule {
        Rule {
            name: name.into(),
            description: None,
            priority: None,
            enforcement: None,
            scope: vec![],
            body: body.into(),
        }
    }

    fn ruleset() -> Ruleset {
        let mut rules = BTreeMap::new();
        rules.insert("b".to_string(), rule("B", "body b"));
        rules.insert("a".to_string(), rule("A", "body a"));
        Ruleset {
            api_version: "v1".into(),
            kind: "Ruleset".into(),
            metadata: Metadata {
                id: "clean".into(),
                name: "Clean Code".into(),
                description: None,
            },
            spec: RulesetSpec { rules },
        }
    }

    #[test]
    fn valid_ruleset() {
        assert_eq!(ruleset().validate(), Ok(()));
        assert_eq!(ruleset().rule_ids(), vec!["a", "b"]);
    }

    #[test]
    fn rejects_wrong_kind() {
        let mut rs = ruleset();
        rs.kind = "Promptset".into();
        assert!(matches!(
            rs.validate(),
            Err(ResourceError::WrongKind { .. })
        ));
    }

    #[test]
    fn rejects_missing_body() {
        let mut rs = ruleset();
        rs.spec.rules.insert("c".into(), rule("C", "  "));
        assert_eq!(
            rs.validate(),
            Err(ResourceError::MissingField("spec.rules.c.body".into()))
        );
    }

    #[test]
    fn rejects_missing_api_version() {
        let mut rs = ruleset();
        rs.api_version = String::new();
        assert_eq!(
            rs.validate(),
            Err(ResourceError::MissingField("apiVersion".into()))
        );
    }

    #[test]
    fn priority_default() {
        let r = rule("A", "x");
        assert_eq!(r.effective_priority(), DEFAULT_RULE_PRIORITY);
        assert!(r.primary_globs().is_empty());
    }
}
