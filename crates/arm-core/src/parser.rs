//! Classify package files into canonical resources.
//!
//! A `.yml`/`.yaml` file is parsed once and tried against both resource
//! shapes; the shape whose validation succeeds wins. Files that are not
//! YAML, or YAML documents that do not declare a resource `kind`, pass
//! through as raw assets.

use arm_schema::{File, Promptset, ResourceKind, Ruleset};
use serde_yaml_ng::Value;
use tracing::{debug, warn};

use crate::error::{ArmError, Result};

/// A classified file.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Ruleset(Ruleset),
    Promptset(Promptset),
}

/// The result of classifying a package's files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPackage {
    /// `(source path, ruleset)` in path order.
    pub rulesets: Vec<(String, Ruleset)>,
    /// `(source path, promptset)` in path order.
    pub promptsets: Vec<(String, Promptset)>,
    /// Everything else, installed verbatim.
    pub assets: Vec<File>,
}

pub fn is_resource_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".yml") || lower.ends_with(".yaml")
}

fn declared_kind(value: &Value) -> Option<&str> {
    value.get("kind").and_then(Value::as_str)
}

/// Classify a single file.
///
/// Returns `Ok(None)` for non-resource files.
///
/// # Errors
///
/// A file that declares `kind: Ruleset` or `kind: Promptset` but fails
/// validation, or a YAML file that does not parse, is an error naming the
/// file's path.
pub fn parse_resource(file: &File) -> Result<Option<Resource>> {
    if !is_resource_path(&file.path) {
        return Ok(None);
    }
    let text = std::str::from_utf8(&file.content)
        .map_err(|e| ArmError::parse(&file.path, format!("not valid UTF-8: {e}")))?;
    let value: Value =
        serde_yaml_ng::from_str(text).map_err(|e| ArmError::parse(&file.path, e))?;

    let as_ruleset = serde_yaml_ng::from_value::<Ruleset>(value.clone())
        .map_err(|e| e.to_string())
        .and_then(|r| r.validate().map(|()| r).map_err(|e| e.to_string()));
    if let Ok(rs) = as_ruleset.as_ref() {
        return Ok(Some(Resource::Ruleset(rs.clone())));
    }

    let as_promptset = serde_yaml_ng::from_value::<Promptset>(value.clone())
        .map_err(|e| e.to_string())
        .and_then(|p| p.validate().map(|()| p).map_err(|e| e.to_string()));
    if let Ok(ps) = as_promptset.as_ref() {
        return Ok(Some(Resource::Promptset(ps.clone())));
    }

    match declared_kind(&value) {
        Some(Ruleset::KIND) => Err(ArmError::parse(
            &file.path,
            as_ruleset.err().unwrap_or_default(),
        )),
        Some(Promptset::KIND) => Err(ArmError::parse(
            &file.path,
            as_promptset.err().unwrap_or_default(),
        )),
        _ => Ok(None),
    }
}

/// Classify every file of a package installed as `kind`.
///
/// Resources of the other kind are skipped with a warning; they would
/// otherwise be recorded in the wrong section of the sink index.
pub fn parse_package(files: &[File], kind: ResourceKind) -> Result<ParsedPackage> {
    let mut out = ParsedPackage::default();
    for file in files {
        match (parse_resource(file)?, kind) {
            (Some(Resource::Ruleset(rs)), ResourceKind::Ruleset) => {
                out.rulesets.push((file.path.clone(), rs));
            }
            (Some(Resource::Promptset(ps)), ResourceKind::Promptset) => {
                out.promptsets.push((file.path.clone(), ps));
            }
            (Some(_), _) => {
                warn!(path = %file.path, expected = %kind, "skipping resource of a different kind");
            }
            (None, _) => out.assets.push(file.clone()),
        }
    }
    debug!(
        rulesets = out.rulesets.len(),
        promptsets = out.promptsets.len(),
        assets = out.assets.len(),
        "parsed package"
    );
    Ok(out)
}
