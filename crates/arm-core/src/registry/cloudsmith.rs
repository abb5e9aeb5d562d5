//! Cloudsmith raw package repository.

use arm_schema::{ContentSelector, File, Version};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http::HttpSource;
use super::traits::RegistryAdapter;
use crate::context::OpContext;
use crate::error::{ArmError, Result};

/// Public API endpoint used when a registry does not override `url`.
pub const DEFAULT_API_URL: &str = "https://api.cloudsmith.io";

#[derive(Debug, Clone, Deserialize)]
struct CloudsmithPackage {
    name: String,
    version: String,
    filename: String,
    cdn_url: String,
}

#[derive(Debug)]
pub struct CloudsmithRegistry {
    url: String,
    owner: String,
    repository: String,
    http: HttpSource,
}

impl CloudsmithRegistry {
    pub fn new(
        url: impl Into<String>,
        owner: impl Into<String>,
        repository: impl Into<String>,
        http: HttpSource,
    ) -> Self {
        Self {
            url: url.into(),
            owner: owner.into(),
            repository: repository.into(),
            http,
        }
    }

    async fn packages(&self, ctx: &OpContext, package: &str) -> Result<Vec<CloudsmithPackage>> {
        let url = format!(
            "{}/v1/packages/{}/{}/",
            self.url.trim_end_matches('/'),
            self.owner,
            self.repository
        );
        let query = [("query", format!("name:{package}"))];
        let all: Vec<CloudsmithPackage> = self.http.get_all_pages(ctx, &url, &query, "page_size").await?;
        Ok(all.into_iter().filter(|p| p.name == package).collect())
    }
}

#[async_trait]
impl RegistryAdapter for CloudsmithRegistry {
    fn registry_type(&self) -> &'static str {
        "cloudsmith"
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn list_versions(&self, ctx: &OpContext, package: &str) -> Result<Vec<Version>> {
        let mut ids: Vec<String> = self
            .packages(ctx, package)
            .await?
            .into_iter()
            .map(|p| p.version)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids.into_iter().map(Version::tag).collect())
    }

    async fn get_content(
        &self,
        ctx: &OpContext,
        package: &str,
        version: &Version,
        _selector: &ContentSelector,
    ) -> Result<Vec<File>> {
        let entries: Vec<CloudsmithPackage> = self
            .packages(ctx, package)
            .await?
            .into_iter()
            .filter(|p| p.version == version.id)
            .collect();
        if entries.is_empty() {
            return Err(ArmError::NotFound(format!("{package}@{version}")));
        }

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let content = self.http.get_bytes(ctx, &entry.cdn_url).await?;
            files.push(File::new(&entry.filename, content));
        }
        debug!(package, version = %version, files = files.len(), "downloaded cloudsmith package");
        Ok(files)
    }
}
