//! Compile canonical resources into tool-specific files.
//!
//! Every tool shares the same rule document (URF metadata block, heading,
//! body); targets differ only in filename extension and the frontmatter
//! they put in front of it. Prompts compile to their body alone for every
//! tool. Output is deterministic: rules and prompts are emitted in sorted
//! ID order and scope globs keep their declared order.

pub mod copilot;
pub mod cursor;
pub mod markdown;
pub mod metadata;

use std::collections::BTreeMap;
use std::fmt;

use arm_schema::{File, Prompt, Promptset, Rule, Ruleset, Tool};
use tracing::{debug, warn};

use crate::parser::ParsedPackage;
pub use copilot::CopilotTarget;
pub use cursor::CursorTarget;
pub use markdown::MarkdownTarget;
use metadata::RulesetHeader;

/// `<registry>/<package>@<version>` identity stamped into compiled rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub registry: String,
    pub package: String,
    pub version: String,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.registry, self.package, self.version)
    }
}

/// Output policy of one AI tool.
pub trait Target: Send + Sync {
    fn tool(&self) -> Tool;

    /// Tool-specific frontmatter, including its `---` fences.
    fn frontmatter(&self, rule: &Rule) -> Option<String>;

    fn rule_filename(&self, ruleset_id: &str, rule_id: &str) -> String {
        format!("{ruleset_id}_{rule_id}.{}", self.tool().rule_extension())
    }

    fn prompt_filename(&self, promptset_id: &str, prompt_id: &str) -> String {
        format!("{promptset_id}_{prompt_id}.md")
    }

    fn render_rule(&self, namespace: &str, header: &RulesetHeader, rule_id: &str, rule: &Rule) -> String {
        let mut out = String::new();
        if let Some(fm) = self.frontmatter(rule) {
            out.push_str(&fm);
            out.push('\n');
        }
        out.push_str(&metadata::urf_block(namespace, header, rule_id, rule));
        out.push('\n');
        match rule.enforcement {
            Some(e) => out.push_str(&format!("# {} ({})\n", rule.name, e.as_str().to_uppercase())),
            None => out.push_str(&format!("# {}\n", rule.name)),
        }
        out.push('\n');
        out.push_str(rule.body.trim_end());
        out.push('\n');
        out
    }

    fn render_prompt(&self, prompt: &Prompt) -> String {
        prompt.body.clone()
    }
}

/// Target for a sink's tool.
pub fn target_for(tool: Tool) -> Box<dyn Target> {
    match tool {
        Tool::Cursor => Box::new(CursorTarget),
        Tool::Copilot => Box::new(CopilotTarget),
        Tool::AmazonQ | Tool::Markdown => Box::new(MarkdownTarget::new(tool)),
    }
}

/// One file per rule, in rule ID order.
pub fn compile_ruleset(target: &dyn Target, ns: &Namespace, ruleset: &Ruleset) -> Vec<File> {
    let namespace = ns.to_string();
    let header = RulesetHeader::new(ruleset, Some(&ns.version));
    ruleset
        .spec
        .rules
        .iter()
        .map(|(id, rule)| {
            File::new(
                target.rule_filename(&ruleset.metadata.id, id),
                target.render_rule(&namespace, &header, id, rule),
            )
        })
        .collect()
}

/// One file per prompt, in prompt ID order.
pub fn compile_promptset(target: &dyn Target, promptset: &Promptset) -> Vec<File> {
    promptset
        .spec
        .prompts
        .iter()
        .map(|(id, prompt)| {
            File::new(
                target.prompt_filename(&promptset.metadata.id, id),
                target.render_prompt(prompt),
            )
        })
        .collect()
}

/// Compile a parsed package for `tool`: compiled resources at the package
/// root plus raw assets at their original relative paths, sorted by path.
pub fn compile_package(tool: Tool, ns: &Namespace, parsed: &ParsedPackage) -> Vec<File> {
    let target = target_for(tool);
    let mut out: BTreeMap<String, File> = parsed
        .assets
        .iter()
        .map(|f| (f.path.clone(), f.clone()))
        .collect();

    let compiled = parsed
        .rulesets
        .iter()
        .flat_map(|(_, rs)| compile_ruleset(target.as_ref(), ns, rs))
        .chain(
            parsed
                .promptsets
                .iter()
                .flat_map(|(_, ps)| compile_promptset(target.as_ref(), ps)),
        );
    for file in compiled {
        if out.contains_key(&file.path) {
            warn!(path = %file.path, package = %ns, "compiled file overrides another output");
        }
        out.insert(file.path.clone(), file);
    }

    debug!(package = %ns, tool = %tool, files = out.len(), "compiled package");
    out.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arm_schema::{Enforcement, Metadata, PromptsetSpec, RulesetSpec, Scope};
    use pretty_assertions::assert_eq;

    fn ns() -> Namespace {
        Namespace {
            registry: "reg".into(),
            package: "pkg".into(),
            version: "v1.0.0".into(),
        }
    }

    fn ruleset() -> Ruleset {
        let mut rules = BTreeMap::new();
        rules.insert(
            "small".to_string(),
            Rule {
                name: "Small functions".into(),
                description: Some("Keep it short".into()),
                priority: Some(100),
                enforcement: Some(Enforcement::Must),
                scope: vec![Scope {
                    files: vec!["**/*.ts".into(), "**/*.tsx".into()],
                }],
                body: "Functions stay under 40 lines.\n\n".into(),
            },
        );
        rules.insert(
            "naming".to_string(),
            Rule {
                name: "Naming".into(),
                description: None,
                priority: None,
                enforcement: None,
                scope: vec![],
                body: "Use clear names.".into(),
            },
        );
        Ruleset {
            api_version: "v1".into(),
            kind: "Ruleset".into(),
            metadata: Metadata {
                id: "clean".into(),
                name: "Clean".into(),
                description: None,
            },
            spec: RulesetSpec { rules },
        }
    }

    #[test]
    fn cursor_rule_exact_output() {
        let files = compile_ruleset(&CursorTarget, &ns(), &ruleset());
        let names: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["clean_naming.mdc", "clean_small.mdc"]);

        let text = String::from_utf8(files[1].content.clone()).unwrap();
        let expected = r#"---
description: "Keep it short"
globs: ["**/*.ts", "**/*.tsx"]
alwaysApply: true
---

---
namespace: reg/pkg@v1.0.0
ruleset:
  id: clean
  name: Clean
  version: v1.0.0
  rules:
    - naming
    - small
rule:
  id: small
  name: "Small functions"
  enforcement: must
  priority: 100
  scope:
    - files:
        - "**/*.ts"
        - "**/*.tsx"
---

# Small functions (MUST)

Functions stay under 40 lines.
"#;
        assert_eq!(text, expected);
    }

    #[test]
    fn cursor_defaults_without_scope_or_enforcement() {
        let files = compile_ruleset(&CursorTarget, &ns(), &ruleset());
        let text = String::from_utf8(files[0].content.clone()).unwrap();
        assert!(text.starts_with("---\nglobs: [\"**/*\"]\n---\n"));
        assert!(!text.contains("alwaysApply"));
        assert!(text.contains("\n# Naming\n"));
    }

    #[test]
    fn markdown_has_no_tool_frontmatter() {
        let target = target_for(Tool::AmazonQ);
        let files = compile_ruleset(target.as_ref(), &ns(), &ruleset());
        assert_eq!(files[0].path, "clean_naming.md");
        let text = String::from_utf8(files[0].content.clone()).unwrap();
        assert!(text.starts_with("---\nnamespace: reg/pkg@v1.0.0\n"));
        assert!(!text.contains("globs:"));
    }

    #[test]
    fn copilot_apply_to() {
        let files = compile_ruleset(&CopilotTarget, &ns(), &ruleset());
        assert_eq!(files[1].path, "clean_small.instructions.md");
        let small = String::from_utf8(files[1].content.clone()).unwrap();
        assert!(small.starts_with("---\napplyTo: \"**/*.ts,**/*.tsx\"\n---\n"));
        let naming = String::from_utf8(files[0].content.clone()).unwrap();
        assert!(naming.starts_with("---\napplyTo: \"**\"\n---\n"));
    }

    #[test]
    fn prompts_are_body_only() {
        let mut prompts = BTreeMap::new();
        prompts.insert(
            "pr".to_string(),
            Prompt {
                name: "PR".into(),
                description: Some("d".into()),
                body: "Review this.\n".into(),
            },
        );
        let ps = Promptset {
            api_version: "v1".into(),
            kind: "Promptset".into(),
            metadata: Metadata {
                id: "review".into(),
                name: "Review".into(),
                description: None,
            },
            spec: PromptsetSpec { prompts },
        };
        for tool in [Tool::Cursor, Tool::Copilot, Tool::Markdown] {
            let target = target_for(tool);
            let files = compile_promptset(target.as_ref(), &ps);
            assert_eq!(files, vec![File::new("review_pr.md", "Review this.\n")]);
        }
    }

    #[test]
    fn compile_is_deterministic() {
        let parsed = ParsedPackage {
            rulesets: vec![("a.yml".into(), ruleset())],
            promptsets: vec![],
            assets: vec![File::new("docs/readme.md", "r")],
        };
        let a = compile_package(Tool::Cursor, &ns(), &parsed);
        let b = compile_package(Tool::Cursor, &ns(), &parsed);
        assert_eq!(a, b);
        let paths: Vec<&str> = a.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["clean_naming.mdc", "clean_small.mdc", "docs/readme.md"]);
    }
}
