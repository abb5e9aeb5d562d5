//! Registry configuration and adapters.

pub mod cloudsmith;
pub mod git;
pub mod gitlab;
pub mod http;
pub mod traits;

use serde::{Deserialize, Serialize};

pub use cloudsmith::CloudsmithRegistry;
pub use git::GitRegistry;
pub use gitlab::{GitLabRegistry, GitLabScope};
pub use traits::{RegistryAdapter, ResolvedVersion};

use crate::context::ArmConfig;
use crate::error::{ArmError, Result};
use crate::storage::Storage;
use http::HttpSource;

const DEFAULT_GITLAB_API_VERSION: &str = "v4";

fn default_cloudsmith_url() -> String {
    cloudsmith::DEFAULT_API_URL.to_string()
}

/// A registry entry in `arm.json`, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistryConfig {
    Git {
        url: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        branches: Vec<String>,
    },
    #[serde(rename = "gitlab", rename_all = "camelCase")]
    GitLab {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_version: Option<String>,
    },
    Cloudsmith {
        #[serde(default = "default_cloudsmith_url")]
        url: String,
        owner: String,
        repository: String,
    },
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl RegistryConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Git { .. } => "git",
            Self::GitLab { .. } => "gitlab",
            Self::Cloudsmith { .. } => "cloudsmith",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Git { url, .. } | Self::GitLab { url, .. } | Self::Cloudsmith { url, .. } => url,
        }
    }

    /// Storage key shared by every adapter for this registry.
    pub fn key(&self) -> String {
        arm_schema::registry_key(self.url(), self.type_name())
            .as_str()
            .to_string()
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        if self.url().trim().is_empty() {
            return Err(ArmError::config("registry url must not be empty"));
        }
        match self {
            Self::GitLab {
                project_id,
                group_id,
                ..
            } => match (project_id, group_id) {
                (Some(_), Some(_)) => Err(ArmError::config(
                    "gitlab registry takes either projectId or groupId, not both",
                )),
                (None, None) => Err(ArmError::config("gitlab registry requires projectId or groupId")),
                _ => Ok(()),
            },
            Self::Cloudsmith {
                owner, repository, ..
            } if owner.is_empty() || repository.is_empty() => Err(ArmError::config(
                "cloudsmith registry requires owner and repository",
            )),
            _ => Ok(()),
        }
    }

    /// Update one field by name. Accepts camelCase, kebab-case or
    /// snake_case names.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        let normalized = field.replace(['-', '_'], "").to_lowercase();
        let value = value.to_string();
        match (&mut *self, normalized.as_str()) {
            (
                Self::Git { url, .. } | Self::GitLab { url, .. } | Self::Cloudsmith { url, .. },
                "url",
            ) => *url = value,
            (Self::Git { branches, .. }, "branches") => *branches = split_list(&value),
            (Self::GitLab { project_id, .. }, "projectid") => *project_id = Some(value),
            (Self::GitLab { group_id, .. }, "groupid") => *group_id = Some(value),
            (Self::GitLab { api_version, .. }, "apiversion") => *api_version = Some(value),
            (Self::Cloudsmith { owner, .. }, "owner") => *owner = value,
            (Self::Cloudsmith { repository, .. }, "repository" | "repo") => *repository = value,
            (cfg, _) => {
                return Err(ArmError::config(format!(
                    "unknown field '{field}' for {} registry",
                    cfg.type_name()
                )));
            }
        }
        self.validate()
    }

    /// Field/value pairs for display.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![("type", self.type_name().to_string()), ("url", self.url().to_string())];
        match self {
            Self::Git { branches, .. } if !branches.is_empty() => {
                out.push(("branches", branches.join(",")));
            }
            Self::GitLab {
                project_id,
                group_id,
                api_version,
                ..
            } => {
                if let Some(p) = project_id {
                    out.push(("projectId", p.clone()));
                }
                if let Some(g) = group_id {
                    out.push(("groupId", g.clone()));
                }
                out.push((
                    "apiVersion",
                    api_version.clone().unwrap_or_else(|| DEFAULT_GITLAB_API_VERSION.into()),
                ));
            }
            Self::Cloudsmith {
                owner, repository, ..
            } => {
                out.push(("owner", owner.clone()));
                out.push(("repository", repository.clone()));
            }
            Self::Git { .. } => {}
        }
        out
    }
}

/// Build the adapter for a configured registry.
pub fn adapter_for(config: &RegistryConfig, arm: &ArmConfig, storage: &Storage) -> Result<Box<dyn RegistryAdapter>> {
    config.validate()?;
    let adapter: Box<dyn RegistryAdapter> = match config {
        RegistryConfig::Git { url, branches } => Box::new(GitRegistry::new(
            url.clone(),
            branches.clone(),
            storage.repository_dir(&config.key()),
        )),
        RegistryConfig::GitLab {
            url,
            project_id,
            group_id,
            api_version,
        } => {
            let scope = match (project_id, group_id) {
                (Some(p), _) => GitLabScope::Project(p.clone()),
                (None, Some(g)) => GitLabScope::Group(g.clone()),
                (None, None) => return Err(ArmError::config("gitlab registry requires projectId or groupId")),
            };
            Box::new(GitLabRegistry::new(
                url.clone(),
                scope,
                api_version.clone().unwrap_or_else(|| DEFAULT_GITLAB_API_VERSION.into()),
                HttpSource::new(arm.client.clone(), arm.credentials.clone(), "Authorization", "Bearer "),
            ))
        }
        RegistryConfig::Cloudsmith {
            url,
            owner,
            repository,
        } => Box::new(CloudsmithRegistry::new(
            url.clone(),
            owner.clone(),
            repository.clone(),
            HttpSource::new(arm.client.clone(), arm.credentials.clone(), "X-Api-Key", ""),
        )),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tagged_json_shapes() {
        let git: RegistryConfig =
            serde_json::from_str(r#"{"type":"git","url":"https://h/r.git","branches":["main"]}"#).unwrap();
        assert_eq!(
            git,
            RegistryConfig::Git {
                url: "https://h/r.git".into(),
                branches: vec!["main".into()]
            }
        );

        let gl: RegistryConfig =
            serde_json::from_str(r#"{"type":"gitlab","url":"https://gitlab.com","projectId":"42"}"#).unwrap();
        assert!(gl.validate().is_ok());
        let back = serde_json::to_value(&gl).unwrap();
        assert_eq!(back["projectId"], "42");
        assert!(back.get("groupId").is_none());

        let cs: RegistryConfig =
            serde_json::from_str(r#"{"type":"cloudsmith","owner":"acme","repository":"ai"}"#).unwrap();
        assert_eq!(cs.url(), cloudsmith::DEFAULT_API_URL);
    }

    #[test]
    fn gitlab_requires_exactly_one_scope() {
        let mut gl = RegistryConfig::GitLab {
            url: "https://gitlab.com".into(),
            project_id: None,
            group_id: None,
            api_version: None,
        };
        assert!(gl.validate().is_err());
        gl.set_field("project-id", "7").unwrap();
        assert!(gl.set_field("groupId", "g").is_err());
    }

    #[test]
    fn set_field_rejects_unknown() {
        let mut git = RegistryConfig::Git {
            url: "https://h/r".into(),
            branches: vec![],
        };
        git.set_field("branches", "main, release/*").unwrap();
        assert_eq!(
            git,
            RegistryConfig::Git {
                url: "https://h/r".into(),
                branches: vec!["main".into(), "release/*".into()]
            }
        );
        let err = git.set_field("owner", "x").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn factory_builds_each_type() {
        let dir = tempfile::tempdir().unwrap();
        let arm = ArmConfig::with_cache_dir(dir.path())
            .unwrap()
            .with_credentials(std::sync::Arc::new(
                crate::credentials::StaticCredentials::new().with_token("gitlab.example.com", "t0k"),
            ));
        assert_eq!(arm.credentials.token("gitlab.example.com", "/").as_deref(), Some("t0k"));
        let storage = Storage::new(&arm.cache_dir);

        let configs = [
            RegistryConfig::Git {
                url: "https://h/r.git".into(),
                branches: vec![],
            },
            RegistryConfig::GitLab {
                url: "https://gitlab.example.com".into(),
                project_id: None,
                group_id: Some("9".into()),
                api_version: None,
            },
            RegistryConfig::Cloudsmith {
                url: cloudsmith::DEFAULT_API_URL.into(),
                owner: "acme".into(),
                repository: "ai".into(),
            },
        ];
        for cfg in &configs {
            let adapter = adapter_for(cfg, &arm, &storage).unwrap();
            assert_eq!(adapter.registry_type(), cfg.type_name());
            assert_eq!(adapter.url(), cfg.url());
            assert_eq!(adapter.key(), cfg.key());
        }

        let unscoped = RegistryConfig::GitLab {
            url: "https://gitlab.example.com".into(),
            project_id: None,
            group_id: None,
            api_version: None,
        };
        assert!(adapter_for(&unscoped, &arm, &storage).is_err());
    }

    #[test]
    fn key_ignores_trailing_git_suffix() {
        let a = RegistryConfig::Git {
            url: "https://h/r.git".into(),
            branches: vec![],
        };
        let b = RegistryConfig::Git {
            url: "https://H/r/".into(),
            branches: vec![],
        };
        assert_eq!(a.key(), b.key());
    }
}
