//! Add command (registries and sinks)

use anyhow::{Result, bail};
use arm_core::Reporter;
use arm_core::manifest::SinkConfig;
use arm_core::registry::RegistryConfig;
use arm_core::registry::cloudsmith::DEFAULT_API_URL;

use crate::ops::Project;
use crate::{AddRegistryArgs, AddSinkArgs, RegistryType};

fn registry_config(args: AddRegistryArgs) -> Result<RegistryConfig> {
    let AddRegistryArgs {
        kind,
        url,
        project_id,
        group_id,
        api_version,
        owner,
        repository,
        branches,
        ..
    } = args;
    let config = match kind {
        RegistryType::Git => RegistryConfig::Git {
            url: url.unwrap_or_default(),
            branches,
        },
        RegistryType::Gitlab => RegistryConfig::GitLab {
            url: url.unwrap_or_default(),
            project_id,
            group_id,
            api_version,
        },
        RegistryType::Cloudsmith => RegistryConfig::Cloudsmith {
            url: url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            owner: owner.unwrap_or_default(),
            repository: repository.unwrap_or_default(),
        },
    };
    if config.url().is_empty() {
        bail!(arm_core::ArmError::config(format!(
            "{} registry requires --url",
            config.type_name()
        )));
    }
    Ok(config)
}

/// Add a registry to the manifest
pub async fn registry(project: &Project, args: AddRegistryArgs) -> Result<()> {
    let name = args.name.clone();
    let force = args.force;
    let config = registry_config(args)?;

    let _lock = project.lock().await?;
    let mut manifest = project.manifest().await?;
    manifest.add_registry(&name, config.clone(), force)?;

    if project.dry_run {
        project
            .output
            .dry_run(&format!("would add {} registry '{name}' ({})", config.type_name(), config.url()));
        return Ok(());
    }
    project.save_manifest(&manifest).await?;
    project
        .reporter
        .success(&format!("Added {} registry '{name}'", config.type_name()));
    Ok(())
}

/// Add a sink to the manifest
pub async fn sink(project: &Project, args: AddSinkArgs) -> Result<()> {
    let config = SinkConfig {
        directory: args.directory,
        tool: args.tool,
        layout: args.layout,
    };

    let _lock = project.lock().await?;
    let mut manifest = project.manifest().await?;
    manifest.add_sink(&args.name, config.clone(), args.force)?;

    if project.dry_run {
        project.output.dry_run(&format!(
            "would add {} sink '{}' at {}",
            config.tool, args.name, config.directory
        ));
        return Ok(());
    }
    project.save_manifest(&manifest).await?;
    project.reporter.success(&format!(
        "Added {} sink '{}' at {} ({})",
        config.tool,
        args.name,
        config.directory,
        config.layout()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(kind: RegistryType) -> AddRegistryArgs {
        AddRegistryArgs {
            kind,
            name: "r".into(),
            url: None,
            project_id: None,
            group_id: None,
            api_version: None,
            owner: Some("acme".into()),
            repository: Some("ai".into()),
            branches: vec![],
            force: false,
        }
    }

    #[test]
    fn git_requires_url() {
        assert!(registry_config(args(RegistryType::Git)).is_err());
    }

    #[test]
    fn cloudsmith_url_defaults() {
        let cfg = registry_config(args(RegistryType::Cloudsmith)).unwrap();
        assert_eq!(cfg.url(), DEFAULT_API_URL);
    }
}
