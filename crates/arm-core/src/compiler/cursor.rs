use arm_schema::{Enforcement, Rule, Tool};

use super::Target;
use super::metadata::{flow_list, quoted};

const DEFAULT_GLOBS: &[&str] = &["**/*"];

/// Cursor `.mdc` rules: tool frontmatter, then the shared rule document.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorTarget;

impl Target for CursorTarget {
    fn tool(&self) -> Tool {
        Tool::Cursor
    }

    fn frontmatter(&self, rule: &Rule) -> Option<String> {
        let mut out = String::from("---\n");
        if let Some(desc) = &rule.description {
            out.push_str(&format!("description: {}\n", quoted(desc)));
        }
        let globs: Vec<String> = if rule.primary_globs().is_empty() {
            DEFAULT_GLOBS.iter().map(|s| (*s).to_string()).collect()
        } else {
            rule.primary_globs().to_vec()
        };
        out.push_str(&format!("globs: {}\n", flow_list(&globs)));
        if rule.enforcement == Some(Enforcement::Must) {
            out.push_str("alwaysApply: true\n");
        }
        out.push_str("---\n");
        Some(out)
    }
}
