use arm_schema::{Rule, Tool};

use super::Target;
use super::metadata::quoted;

const DEFAULT_APPLY_TO: &str = "**";

/// GitHub Copilot `.instructions.md` files keyed by `applyTo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopilotTarget;

impl Target for CopilotTarget {
    fn tool(&self) -> Tool {
        Tool::Copilot
    }

    fn frontmatter(&self, rule: &Rule) -> Option<String> {
        let globs = rule.primary_globs();
        let apply_to = if globs.is_empty() {
            DEFAULT_APPLY_TO.to_string()
        } else {
            globs.join(",")
        };
        Some(format!("---\napplyTo: {}\n---\n", quoted(&apply_to)))
    }
}
