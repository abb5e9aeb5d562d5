//! Sink index (`arm-index.json`) and the generated priority index
//! (`arm_index.<ext>`).

use std::collections::BTreeMap;
use arm_schema::Tool;
use serde::{Deserialize, Serialize};

/// An installed ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetEntry {
    pub version: String,
    pub priority: i64,
    pub file_paths: Vec<String>,
}

/// An installed promptset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptsetEntry {
    pub version: String,
    pub file_paths: Vec<String>,
}

/// What ARM has installed into one sink, keyed by registry then package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkIndex {
    #[serde(default)]
    pub rulesets: BTreeMap<String, BTreeMap<String, RulesetEntry>>,
    #[serde(default)]
    pub promptsets: BTreeMap<String, BTreeMap<String, PromptsetEntry>>,
}

impl SinkIndex {
    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty() && self.promptsets.is_empty()
    }

    pub fn has_rulesets(&self) -> bool {
        !self.rulesets.is_empty()
    }

    pub fn contains(&self, registry: &str, package: &str) -> bool {
        self.rulesets.get(registry).is_some_and(|p| p.contains_key(package))
            || self.promptsets.get(registry).is_some_and(|p| p.contains_key(package))
    }

    /// Drop any entry for `(registry, package)`; returns its file paths.
    pub fn remove(&mut self, registry: &str, package: &str) -> Vec<String> {
        let mut paths = Vec::new();
        if let Some(pkgs) = self.rulesets.get_mut(registry) {
            if let Some(e) = pkgs.remove(package) {
                paths.extend(e.file_paths);
            }
            if pkgs.is_empty() {
                self.rulesets.remove(registry);
            }
        }
        if let Some(pkgs) = self.promptsets.get_mut(registry) {
            if let Some(e) = pkgs.remove(package) {
                paths.extend(e.file_paths);
            }
            if pkgs.is_empty() {
                self.promptsets.remove(registry);
            }
        }
        paths
    }

    pub fn insert_ruleset(&mut self, registry: &str, package: &str, entry: RulesetEntry) {
        self.rulesets
            .entry(registry.to_string())
            .or_default()
            .insert(package.to_string(), entry);
    }

    pub fn insert_promptset(&mut self, registry: &str, package: &str, entry: PromptsetEntry) {
        self.promptsets
            .entry(registry.to_string())
            .or_default()
            .insert(package.to_string(), entry);
    }

    /// `(registry, package, entry)` by priority descending, then
    /// `(registry, package)` ascending.
    pub fn rulesets_by_priority(&self) -> Vec<(&str, &str, &RulesetEntry)> {
        let mut all: Vec<(&str, &str, &RulesetEntry)> = self
            .rulesets
            .iter()
            .flat_map(|(reg, pkgs)| pkgs.iter().map(move |(name, e)| (reg.as_str(), name.as_str(), e)))
            .collect();
        all.sort_by(|a, b| b.2.priority.cmp(&a.2.priority).then((a.0, a.1).cmp(&(b.0, b.1))));
        all
    }
}

const INDEX_TITLE: &str = "ARM Rulesets Index";

fn priority_body(index: &SinkIndex) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {INDEX_TITLE}\n\n"));
    out.push_str(
        "This file is generated by ARM and lists the installed rulesets from highest to lowest priority.\n",
    );
    out.push_str("When rules from different rulesets conflict, follow the ruleset with the higher priority.\n\n");
    out.push_str("## Installed Rulesets\n");
    for (registry, name, entry) in index.rulesets_by_priority() {
        out.push_str(&format!("\n### {registry}/{name}@{}\n", entry.version));
        out.push_str(&format!("- **Priority:** {}\n", entry.priority));
        out.push_str("- **Rules:**\n");
        for path in &entry.file_paths {
            out.push_str(&format!("  - {path}\n"));
        }
    }
    out
}

/// Filename of the priority index for `tool`.
pub fn priority_index_filename(tool: Tool) -> String {
    format!("{}.{}", crate::paths::PRIORITY_INDEX_STEM, tool.rule_extension())
}

/// Render the priority index with the frontmatter `tool` expects.
pub fn render_priority_index(tool: Tool, index: &SinkIndex) -> String {
    let body = priority_body(index);
    match tool {
        Tool::Cursor => format!(
            "---\ndescription: \"{INDEX_TITLE} and priority guide\"\nglobs: [\"**/*\"]\nalwaysApply: true\n---\n\n{body}"
        ),
        Tool::Copilot => format!("---\napplyTo: \"**\"\n---\n\n{body}"),
        Tool::AmazonQ | Tool::Markdown => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(version: &str, priority: i64) -> RulesetEntry {
        RulesetEntry {
            version: version.into(),
            priority,
            file_paths: vec![format!("arm/x/{version}.mdc")],
        }
    }

    #[test]
    fn orders_by_priority_then_name() {
        let mut idx = SinkIndex::default();
        idx.insert_ruleset("reg", "a", entry("v1.0.0", 50));
        idx.insert_ruleset("reg", "b", entry("v1.0.0", 200));
        idx.insert_ruleset("reg", "c", entry("v1.0.0", 50));
        idx.insert_ruleset("alpha", "z", entry("v1.0.0", 50));
        let order: Vec<(&str, &str)> = idx
            .rulesets_by_priority()
            .into_iter()
            .map(|(r, n, _)| (r, n))
            .collect();
        assert_eq!(
            order,
            vec![("reg", "b"), ("alpha", "z"), ("reg", "a"), ("reg", "c")]
        );
    }

    #[test]
    fn rendered_index_lists_higher_priority_first() {
        let mut idx = SinkIndex::default();
        idx.insert_ruleset("reg", "low", entry("v1.0.0", 50));
        idx.insert_ruleset("reg", "high", entry("v2.0.0", 200));
        let text = render_priority_index(Tool::Cursor, &idx);
        let high = text.find("### reg/high@v2.0.0").unwrap();
        let low = text.find("### reg/low@v1.0.0").unwrap();
        assert!(high < low);
        assert!(text.contains("- **Priority:** 200"));
        assert!(text.starts_with("---\n"));
    }

    #[test]
    fn markdown_index_body() {
        let mut idx = SinkIndex::default();
        idx.insert_ruleset("reg", "clean", entry("v1.0.0", 100));
        assert_eq!(
            render_priority_index(Tool::Markdown, &idx),
            "# ARM Rulesets Index\n\n\
             This file is generated by ARM and lists the installed rulesets from highest to lowest priority.\n\
             When rules from different rulesets conflict, follow the ruleset with the higher priority.\n\n\
             ## Installed Rulesets\n\
             \n### reg/clean@v1.0.0\n\
             - **Priority:** 100\n\
             - **Rules:**\n\
             \x20 - arm/x/v1.0.0.mdc\n"
        );
    }

    #[test]
    fn remove_prunes_empty_registries() {
        let mut idx = SinkIndex::default();
        idx.insert_ruleset("reg", "a", entry("v1.0.0", 1));
        idx.insert_promptset(
            "reg",
            "p",
            PromptsetEntry {
                version: "v1.0.0".into(),
                file_paths: vec!["p.md".into()],
            },
        );
        assert_eq!(idx.remove("reg", "a"), vec!["arm/x/v1.0.0.mdc".to_string()]);
        assert!(idx.rulesets.is_empty());
        assert!(!idx.is_empty());
        assert_eq!(idx.remove("reg", "p"), vec!["p.md".to_string()]);
        assert!(idx.is_empty());
        assert!(idx.remove("reg", "missing").is_empty());
    }

    #[test]
    fn json_shape() {
        let mut idx = SinkIndex::default();
        idx.insert_ruleset("reg", "a", entry("v1.0.0", 100));
        let v = serde_json::to_value(&idx).unwrap();
        assert_eq!(v["rulesets"]["reg"]["a"]["priority"], 100);
        assert_eq!(v["rulesets"]["reg"]["a"]["file_paths"][0], "arm/x/v1.0.0.mdc");
        assert!(v["promptsets"].as_object().unwrap().is_empty());
    }
}
