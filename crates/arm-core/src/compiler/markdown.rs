use arm_schema::{Rule, Tool};

use super::Target;

/// Plain markdown, shared by the `markdown` and `amazonq` tools.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownTarget {
    tool: Tool,
}

impl MarkdownTarget {
    pub fn new(tool: Tool) -> Self {
        Self { tool }
    }
}

impl Target for MarkdownTarget {
    fn tool(&self) -> Tool {
        self.tool
    }

    fn frontmatter(&self, _rule: &Rule) -> Option<String> {
        None
    }
}
