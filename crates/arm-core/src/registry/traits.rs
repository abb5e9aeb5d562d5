use arm_schema::{Constraint, ContentSelector, File, Version, registry_key};
use async_trait::async_trait;

use crate::context::OpContext;
use crate::error::Result;

/// A version chosen for a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    /// Constraint as parsed against the registry's references.
    pub constraint: Constraint,
    /// Concrete version to fetch.
    pub version: Version,
    /// Reference the match came from: tag name, branch name, or full commit.
    pub reference: String,
}

/// A source of versioned package content.
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Registry type as written in `arm.json` (`git`, `gitlab`, `cloudsmith`).
    fn registry_type(&self) -> &'static str;

    /// Base URL the cache key derives from.
    fn url(&self) -> &str;

    /// Storage key of this registry.
    fn key(&self) -> String {
        registry_key(self.url(), self.registry_type()).as_str().to_string()
    }

    /// All versions offered for `package`.
    async fn list_versions(&self, ctx: &OpContext, package: &str) -> Result<Vec<Version>>;

    /// Resolve a raw constraint string to a concrete version.
    async fn resolve_version(
        &self,
        ctx: &OpContext,
        package: &str,
        constraint: &str,
    ) -> Result<ResolvedVersion> {
        let versions = self.list_versions(ctx, package).await?;
        let constraint =
            Constraint::parse_with_refs(constraint, versions.iter().map(|v| v.id.as_str()))?;
        let best = constraint.find_best_match(&versions)?.clone();
        Ok(ResolvedVersion {
            reference: best.id.clone(),
            constraint,
            version: best,
        })
    }

    /// Raw files of `version`. Adapters may pre-filter by `selector` but
    /// must keep archives, which are expanded later.
    async fn get_content(
        &self,
        ctx: &OpContext,
        package: &str,
        version: &Version,
        selector: &ContentSelector,
    ) -> Result<Vec<File>>;
}
