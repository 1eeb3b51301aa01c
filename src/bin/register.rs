//! Registration helper: deploy tool Lambda functions and register them as
//! action groups on the Bedrock agent.
//!
//! Exits non-zero if any tool fails, printing a per-tool summary either way.

#![warn(clippy::all, rust_2018_idioms)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agentdeck::app::config::AgentDeckConfig;
use agentdeck::app::registrar::{ActionRegistrar, DeployerSettings};
use agentdeck::app::tool_spec::load_tool_specs;

#[derive(Parser, Debug)]
#[command(
    name = "agentdeck-register",
    about = "Deploy tool Lambda functions and register them as Bedrock agent actions",
    version
)]
struct Args {
    /// Path to the tools definition file (JSON array of tool specs)
    #[arg(long, default_value = "tools.json")]
    tools: PathBuf,

    /// Path to the config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent identifier (overrides the config file)
    #[arg(long)]
    agent_id: Option<String>,

    /// Resource name prefix for deployed functions (overrides the config file)
    #[arg(long)]
    prefix: Option<String>,

    /// AWS credential profile (overrides the config file)
    #[arg(long)]
    profile: Option<String>,

    /// Target region (overrides the config file)
    #[arg(long)]
    region: Option<String>,

    /// Bucket for deployment packages (overrides the config file)
    #[arg(long)]
    bucket: Option<String>,

    /// Execution role ARN for created functions (overrides the config file)
    #[arg(long)]
    role_arn: Option<String>,
}

impl Args {
    fn resolve_config(&self) -> Result<AgentDeckConfig> {
        let mut config = match &self.config {
            Some(path) => AgentDeckConfig::load_from(path)?,
            None => AgentDeckConfig::load()?,
        };
        if let Some(agent_id) = &self.agent_id {
            config.agent_id = agent_id.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.function_prefix = prefix.clone();
        }
        if let Some(profile) = &self.profile {
            config.profile = Some(profile.clone());
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(bucket) = &self.bucket {
            config.artifact_bucket = bucket.clone();
        }
        if let Some(role_arn) = &self.role_arn {
            config.lambda_role_arn = role_arn.clone();
        }
        config.validate()?;
        if config.lambda_role_arn.is_empty() {
            anyhow::bail!(
                "No execution role configured; set lambda_role_arn in the config file or pass --role-arn"
            );
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agentdeck=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Configuration errors fail fast, before any cloud call.
    let config = args.resolve_config()?;
    let specs = load_tool_specs(&args.tools)
        .with_context(|| format!("Invalid tools file {}", args.tools.display()))?;

    tracing::info!(
        "Registering {} tool(s) on agent {} in {}",
        specs.len(),
        config.agent_id,
        config.region
    );

    let sdk_config = config.sdk_config().await;
    let registrar = ActionRegistrar::new(
        &sdk_config,
        DeployerSettings {
            agent_id: config.agent_id.clone(),
            function_prefix: config.function_prefix.clone(),
            bucket: config.artifact_bucket.clone(),
            role_arn: config.lambda_role_arn.clone(),
        },
    );

    let summary = registrar.register(&specs).await;
    println!("{}", summary.render());

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
