//! arm - AI Rules Manager CLI

use std::process::ExitCode;

use anyhow::Result;
use arm_core::OpContext;
use arm_core::resolver::ResolveMode;
use arm_schema::ResourceKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use arm_cli::cmd;
use arm_cli::cmd::set::Section;
use arm_cli::ops::{self, Project};
use arm_cli::{
    AddCommands, CleanCommands, Cli, Commands, InfoTarget, InstallCommands, NamedTarget, SetTarget,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let ctx = OpContext::new();
    let on_signal = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    match run(cli, ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", ops::render(&e));
            ExitCode::from(ops::exit_code(&e))
        }
    }
}

async fn run(cli: Cli, ctx: OpContext) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        cmd::completions::completions(shell);
        return Ok(());
    }

    let project = Project::new(&cli, ctx)?;
    match cli.command {
        Commands::Add { target } => match target {
            AddCommands::Registry(args) => cmd::add::registry(&project, args).await,
            AddCommands::Sink(args) => cmd::add::sink(&project, args).await,
        },
        Commands::Remove { target } => match target {
            NamedTarget::Registry { name } => cmd::remove::registry(&project, &name).await,
            NamedTarget::Sink { name } => cmd::remove::sink(&project, &name).await,
        },
        Commands::List { target } => cmd::list::list(&project, target).await,
        Commands::Info { target } => match target {
            InfoTarget::Registry { name } => cmd::info::registry(&project, &name).await,
            InfoTarget::Sink { name } => cmd::info::sink(&project, &name).await,
            InfoTarget::Dependency { name } => cmd::info::dependency(&project, &name).await,
        },
        Commands::Set { target } => match target {
            SetTarget::Registry { name, field, value } => {
                cmd::set::set(&project, Section::Registry, &name, &field, &value).await
            }
            SetTarget::Sink { name, field, value } => {
                cmd::set::set(&project, Section::Sink, &name, &field, &value).await
            }
        },
        Commands::Install { kind } => match kind {
            Some(InstallCommands::Ruleset(args)) => {
                cmd::install::install_package(&project, ResourceKind::Ruleset, args).await
            }
            Some(InstallCommands::Promptset(args)) => {
                cmd::install::install_package(&project, ResourceKind::Promptset, args).await
            }
            None => cmd::install::install_all(&project).await,
        },
        Commands::Uninstall { package } => cmd::uninstall::uninstall(&project, package.as_deref()).await,
        Commands::Update => cmd::update::update(&project, ResolveMode::Update).await,
        Commands::Upgrade => cmd::update::update(&project, ResolveMode::Upgrade).await,
        Commands::Outdated => cmd::outdated::outdated(&project).await,
        Commands::Clean { target } => match target {
            CleanCommands::Cache { max_age, nuke } => cmd::clean::cache(&project, max_age, nuke).await,
        },
        Commands::Completions { .. } => Ok(()),
    }
}
