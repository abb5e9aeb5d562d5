//! URF metadata block embedded in every compiled rule.

use arm_schema::{Rule, Ruleset};

/// Ruleset-level fields, captured once per ruleset and shared by its rules.
#[derive(Debug, Clone)]
pub struct RulesetHeader {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub rule_ids: Vec<String>,
}

impl RulesetHeader {
    pub fn new(ruleset: &Ruleset, version: Option<&str>) -> Self {
        Self {
            id: ruleset.metadata.id.clone(),
            name: ruleset.metadata.name.clone(),
            version: version.map(String::from),
            rule_ids: ruleset.rule_ids(),
        }
    }
}

fn is_plain_safe(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let reserved = matches!(
        s.to_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "on" | "off" | "null" | "~"
    );
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '@'))
        && !reserved
}

/// A YAML scalar: bare when unambiguous, otherwise double-quoted.
pub fn scalar(s: &str) -> String {
    if is_plain_safe(s) {
        s.to_string()
    } else {
        quoted(s)
    }
}

/// Double-quoted form. JSON string syntax is valid YAML.
pub fn quoted(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// `["a", "b"]` flow sequence of quoted strings.
pub fn flow_list(items: &[String]) -> String {
    let parts: Vec<String> = items.iter().map(|s| quoted(s)).collect();
    format!("[{}]", parts.join(", "))
}

/// Render the `---`-delimited block naming namespace, ruleset and rule.
pub fn urf_block(namespace: &str, header: &RulesetHeader, rule_id: &str, rule: &Rule) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("namespace: {}\n", scalar(namespace)));
    out.push_str("ruleset:\n");
    out.push_str(&format!("  id: {}\n", scalar(&header.id)));
    out.push_str(&format!("  name: {}\n", scalar(&header.name)));
    if let Some(v) = &header.version {
        out.push_str(&format!("  version: {}\n", scalar(v)));
    }
    out.push_str("  rules:\n");
    for id in &header.rule_ids {
        out.push_str(&format!("    - {}\n", scalar(id)));
    }
    out.push_str("rule:\n");
    out.push_str(&format!("  id: {}\n", scalar(rule_id)));
    out.push_str(&format!("  name: {}\n", scalar(&rule.name)));
    if let Some(e) = rule.enforcement {
        out.push_str(&format!("  enforcement: {}\n", e.as_str()));
    }
    if let Some(p) = rule.priority {
        out.push_str(&format!("  priority: {p}\n"));
    }
    if !rule.scope.is_empty() {
        out.push_str("  scope:\n");
        for scope in &rule.scope {
            out.push_str("    - files:\n");
            for glob in &scope.files {
                out.push_str(&format!("        - {}\n", quoted(glob)));
            }
        }
    }
    out.push_str("---\n");
    out
}
