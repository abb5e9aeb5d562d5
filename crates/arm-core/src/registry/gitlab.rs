//! GitLab generic package registry.
//!
//! Versions are the published versions of a generic package; content is
//! the package's uploaded files, downloaded one by one.

use std::collections::BTreeSet;

use arm_schema::{ContentSelector, File, Version};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http::HttpSource;
use super::traits::RegistryAdapter;
use crate::context::OpContext;
use crate::error::{ArmError, Result};

/// Where packages are listed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitLabScope {
    Project(String),
    Group(String),
}

#[derive(Debug, Clone, Deserialize)]
struct GitLabPackage {
    id: u64,
    name: String,
    version: String,
    #[serde(default)]
    project_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitLabPackageFile {
    file_name: String,
}

#[derive(Debug)]
pub struct GitLabRegistry {
    url: String,
    scope: GitLabScope,
    api_version: String,
    http: HttpSource,
}

/// Project/group IDs may be numeric or a URL-encoded `namespace/path`.
fn encode_id(id: &str) -> String {
    id.replace('/', "%2F")
}

impl GitLabRegistry {
    pub fn new(url: impl Into<String>, scope: GitLabScope, api_version: impl Into<String>, http: HttpSource) -> Self {
        Self {
            url: url.into(),
            scope,
            api_version: api_version.into(),
            http,
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/{}/{path}", self.url.trim_end_matches('/'), self.api_version)
    }

    async fn packages(&self, ctx: &OpContext, package: &str) -> Result<Vec<GitLabPackage>> {
        let list_url = match &self.scope {
            GitLabScope::Project(id) => self.api(&format!("projects/{}/packages", encode_id(id))),
            GitLabScope::Group(id) => self.api(&format!("groups/{}/packages", encode_id(id))),
        };
        let query = [
            ("package_type", "generic".to_string()),
            ("package_name", package.to_string()),
        ];
        let all: Vec<GitLabPackage> = self.http.get_all_pages(ctx, &list_url, &query, "per_page").await?;
        // package_name is a fuzzy filter server-side
        Ok(all.into_iter().filter(|p| p.name == package).collect())
    }

    fn project_for(&self, pkg: &GitLabPackage) -> Result<String> {
        match (&self.scope, pkg.project_id) {
            (GitLabScope::Project(id), _) => Ok(encode_id(id)),
            (GitLabScope::Group(_), Some(pid)) => Ok(pid.to_string()),
            (GitLabScope::Group(g), None) => Err(ArmError::Transport(format!(
                "package {} in group {g} has no project id",
                pkg.name
            ))),
        }
    }
}

#[async_trait]
impl RegistryAdapter for GitLabRegistry {
    fn registry_type(&self) -> &'static str {
        "gitlab"
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn list_versions(&self, ctx: &OpContext, package: &str) -> Result<Vec<Version>> {
        let mut versions: Vec<Version> = self
            .packages(ctx, package)
            .await?
            .into_iter()
            .map(|p| Version::tag(p.version))
            .collect();
        versions.sort_by(|a, b| a.id.cmp(&b.id));
        versions.dedup_by(|a, b| a.id == b.id);
        Ok(versions)
    }

    async fn get_content(
        &self,
        ctx: &OpContext,
        package: &str,
        version: &Version,
        _selector: &ContentSelector,
    ) -> Result<Vec<File>> {
        let pkg = self
            .packages(ctx, package)
            .await?
            .into_iter()
            .find(|p| p.version == version.id)
            .ok_or_else(|| ArmError::NotFound(format!("{package}@{version}")))?;
        let project = self.project_for(&pkg)?;

        let listing: Vec<GitLabPackageFile> = self
            .http
            .get_all_pages(
                ctx,
                &self.api(&format!("projects/{project}/packages/{}/package_files", pkg.id)),
                &[],
                "per_page",
            )
            .await?;

        // Re-uploads leave duplicate entries; the download URL serves the latest.
        let names: BTreeSet<String> = listing.into_iter().map(|f| f.file_name).collect();

        let mut files = Vec::with_capacity(names.len());
        for name in names {
            let url = self.api(&format!(
                "projects/{project}/packages/generic/{package}/{}/{name}",
                version.id
            ));
            let content = self.http.get_bytes(ctx, &url).await?;
            files.push(File::new(&name, content));
        }
        debug!(package, version = %version, files = files.len(), "downloaded gitlab package");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use mockito::{Matcher, Server};
    use std::sync::Arc;

    fn http(host_token: Option<(&str, &str)>) -> HttpSource {
        let creds = match host_token {
            Some((h, t)) => StaticCredentials::new().with_token(h, t),
            None => StaticCredentials::new(),
        };
        HttpSource::new(reqwest::Client::new(), Arc::new(creds), "Authorization", "Bearer ")
    }

    #[tokio::test]
    async fn lists_versions_for_exact_name() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v4/projects/42/packages")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id": 1, "name": "rules", "version": "1.0.0"},
                    {"id": 2, "name": "rules", "version": "1.1.0"},
                    {"id": 3, "name": "rules-extra", "version": "9.0.0"}
                ]"#,
            )
            .create_async()
            .await;

        let reg = GitLabRegistry::new(server.url(), GitLabScope::Project("42".into()), "v4", http(None));
        let versions = reg.list_versions(&OpContext::new(), "rules").await.unwrap();
        let displays: Vec<&str> = versions.iter().map(|v| v.display.as_str()).collect();
        assert_eq!(displays, vec!["v1.0.0", "v1.1.0"]);

        let resolved = reg.resolve_version(&OpContext::new(), "rules", "^1.0.0").await.unwrap();
        assert_eq!(resolved.version.id, "1.1.0");
    }

    #[tokio::test]
    async fn downloads_package_files_with_token() {
        let mut server = Server::new_async().await;
        let host = reqwest::Url::parse(&server.url())
            .unwrap()
            .host_str()
            .unwrap()
            .to_string();

        let _list = server
            .mock("GET", "/api/v4/projects/42/packages")
            .match_query(Matcher::Any)
            .with_body(r#"[{"id": 7, "name": "rules", "version": "1.0.0"}]"#)
            .create_async()
            .await;
        let _files = server
            .mock("GET", "/api/v4/projects/42/packages/7/package_files")
            .match_query(Matcher::Any)
            .with_body(r#"[{"file_name": "rules.yml"}, {"file_name": "rules.yml"}]"#)
            .create_async()
            .await;
        let _blob = server
            .mock("GET", "/api/v4/projects/42/packages/generic/rules/1.0.0/rules.yml")
            .match_header("authorization", "Bearer secret")
            .with_body("kind: Ruleset\n")
            .create_async()
            .await;

        let reg = GitLabRegistry::new(
            server.url(),
            GitLabScope::Project("42".into()),
            "v4",
            http(Some((&host, "secret"))),
        );
        let files = reg
            .get_content(&OpContext::new(), "rules", &Version::tag("1.0.0"), &ContentSelector::default())
            .await
            .unwrap();
        assert_eq!(files, vec![File::new("rules.yml", b"kind: Ruleset\n".to_vec())]);
    }

    #[tokio::test]
    async fn server_error_is_transport() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v4/groups/g/packages")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let reg = GitLabRegistry::new(server.url(), GitLabScope::Group("g".into()), "v4", http(None));
        let err = reg.list_versions(&OpContext::new(), "rules").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }

    #[test]
    fn encodes_path_ids() {
        assert_eq!(encode_id("group/project"), "group%2Fproject");
    }
}
