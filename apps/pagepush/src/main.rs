//! pagepush entry point.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pagepush_deploy::{DeployEvent, DeployPipeline};
use pagepush_pages_client::{PagesClient, ProjectClient};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "pagepush", version, about = "Publish a directory to a pages project")]
struct Cli {
    /// Configuration file (defaults to $PAGEPUSH_CONFIG, then ./pagepush.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy every file under DIR and print the deployment URL.
    Push {
        dir: PathBuf,
    },
    /// List the projects of the configured account, newest first.
    Projects,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match cli.command {
            Command::Push { dir } => push(&config, &dir).await,
            Command::Projects => projects(&config).await,
        }
    })
}

async fn push(config: &Config, dir: &Path) -> anyhow::Result<()> {
    let project = resolve_project(config).await?;
    tracing::info!(
        account = project.account_id(),
        project = project.project_name(),
        dir = %dir.display(),
        "starting deployment"
    );

    let mut pipeline = DeployPipeline::new(Arc::new(project), config.deploy_options());
    if let Some(mut events) = pipeline.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let DeployEvent::BucketUploaded {
                    completed, total, ..
                } = event
                {
                    tracing::info!("uploaded bucket {completed}/{total}");
                }
            }
        });
    }

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling deployment");
            cancel.cancel();
        }
    });

    let result = pipeline.push(dir).await?;
    println!("{}", result.base_url);
    Ok(())
}

async fn projects(config: &Config) -> anyhow::Result<()> {
    let client = PagesClient::new(config.client_config())?;
    let account_id = resolve_account(&client, config).await?;

    for project in client.list_projects(&account_id).await? {
        println!(
            "{}\t{}",
            project.name,
            project.created_on.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Binds the client to the configured target, resolving whatever the
/// configuration leaves unset.
async fn resolve_project(config: &Config) -> anyhow::Result<ProjectClient> {
    let client = PagesClient::new(config.client_config())?;

    let account_id = resolve_account(&client, config).await?;
    let project_name = match &config.pages.project_name {
        Some(name) => name.clone(),
        None => client.resolve_project_name(&account_id).await?,
    };

    Ok(client.project(account_id, project_name))
}

async fn resolve_account(client: &PagesClient, config: &Config) -> anyhow::Result<String> {
    match &config.pages.account_id {
        Some(id) => Ok(id.clone()),
        None => Ok(client
            .resolve_account_id(config.pages.account_name.as_deref())
            .await?),
    }
}
