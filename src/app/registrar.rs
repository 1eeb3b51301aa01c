//! Create-or-update Lambda functions and agent action groups.
//!
//! Registration is an idempotent upsert: for each tool spec the function
//! resource is created if absent or its code updated in place, then the
//! agent's action configuration is updated to map the tool name to the
//! function. Re-running with unchanged specs converges on the same deployed
//! state; the only side effect of a no-op run is a fresh published version.
//!
//! A failure on one tool never aborts the rest. Every failure is recorded
//! with the tool name, the stage it failed in, and the underlying cause, and
//! the caller gets a summary of successes and failures rather than an
//! all-or-nothing outcome.

use crate::app::packaging;
use crate::app::tool_spec::{ParameterType, ToolSpec};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_bedrockagent as bedrockagent;
use aws_sdk_lambda as lambda;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::collections::HashMap;
use tracing::{info, warn};

/// Agent version that action-group changes are applied to.
const AGENT_DRAFT_VERSION: &str = "DRAFT";
const LAMBDA_RUNTIME: &str = "python3.13";
const LAMBDA_HANDLER: &str = "lambda_function.lambda_handler";
const LAMBDA_TIMEOUT_SECS: i32 = 30;

/// Stage of the per-tool registration sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    /// Building the deployment package from the handler path
    Package,
    /// Creating or updating the function resource
    Deploy,
    /// Mapping the tool into the agent's action configuration
    Map,
}

impl std::fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RegistrationStage::Package => "package",
            RegistrationStage::Deploy => "deploy",
            RegistrationStage::Map => "map",
        })
    }
}

/// A deployed, invocable function resource.
#[derive(Debug, Clone)]
pub struct DeployedFunction {
    pub name: String,
    pub arn: String,
    /// True when an existing function was updated rather than created
    pub updated: bool,
}

/// One successfully registered tool.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub tool_name: String,
    pub function_name: String,
    pub function_arn: String,
    pub action_group_id: String,
}

/// One failed tool, isolated from the rest of the run.
#[derive(Debug)]
pub struct RegistrationFailure {
    pub tool_name: String,
    pub stage: RegistrationStage,
    pub error: String,
}

/// Aggregated outcome of a registration run.
#[derive(Debug, Default)]
pub struct RegistrationSummary {
    pub succeeded: Vec<RegisteredTool>,
    pub failed: Vec<RegistrationFailure>,
    /// Error publishing the new agent version, if that final step failed
    pub finalize_error: Option<String>,
}

impl RegistrationSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.finalize_error.is_none()
    }

    /// Human-readable per-tool report for the CLI.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for tool in &self.succeeded {
            lines.push(format!(
                "ok     {} -> {} ({})",
                tool.tool_name, tool.function_name, tool.function_arn
            ));
        }
        for failure in &self.failed {
            lines.push(format!(
                "failed {} [{}]: {}",
                failure.tool_name, failure.stage, failure.error
            ));
        }
        if let Some(error) = &self.finalize_error {
            lines.push(format!("failed preparing agent: {}", error));
        }
        lines.push(format!(
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        ));
        lines.join("\n")
    }
}

/// Seam between the registration sequence and the cloud provider.
///
/// Each tool's own ensure-then-map order must be preserved; no ordering is
/// guaranteed between tools.
#[async_trait]
pub trait ToolDeployer {
    /// Create the function resource if absent, otherwise update its code in
    /// place. Returns the function's invocation reference.
    async fn ensure_function(&self, spec: &ToolSpec, package: &[u8]) -> Result<DeployedFunction>;

    /// Map the tool name to the function in the agent's action configuration.
    /// Returns the action group identifier.
    async fn map_action(&self, spec: &ToolSpec, function: &DeployedFunction) -> Result<String>;

    /// Publish the agent changes (the version bump at the end of a run).
    async fn finalize(&self) -> Result<()>;
}

/// Run the registration sequence for an ordered collection of tool specs.
///
/// Specs are assumed validated (see [`crate::app::tool_spec`]); anything that
/// fails past this point is a per-tool failure, not a configuration error.
pub async fn register_tools<D: ToolDeployer + ?Sized>(
    deployer: &D,
    specs: &[ToolSpec],
) -> RegistrationSummary {
    let mut summary = RegistrationSummary::default();

    for spec in specs {
        let package = match packaging::package_handler(&spec.handler) {
            Ok(package) => package,
            Err(error) => {
                warn!("Packaging failed for tool '{}': {:#}", spec.name, error);
                summary.failed.push(RegistrationFailure {
                    tool_name: spec.name.clone(),
                    stage: RegistrationStage::Package,
                    error: format!("{:#}", error),
                });
                continue;
            }
        };
        info!(
            "Packaged tool '{}': {} files, {} bytes",
            spec.name,
            package.file_count,
            package.bytes.len()
        );

        let function = match deployer.ensure_function(spec, &package.bytes).await {
            Ok(function) => function,
            Err(error) => {
                warn!("Deploy failed for tool '{}': {:#}", spec.name, error);
                summary.failed.push(RegistrationFailure {
                    tool_name: spec.name.clone(),
                    stage: RegistrationStage::Deploy,
                    error: format!("{:#}", error),
                });
                continue;
            }
        };
        info!(
            "{} function {} for tool '{}'",
            if function.updated { "Updated" } else { "Created" },
            function.name,
            spec.name
        );

        match deployer.map_action(spec, &function).await {
            Ok(action_group_id) => {
                info!(
                    "Mapped tool '{}' to {} (action group {})",
                    spec.name, function.arn, action_group_id
                );
                summary.succeeded.push(RegisteredTool {
                    tool_name: spec.name.clone(),
                    function_name: function.name.clone(),
                    function_arn: function.arn.clone(),
                    action_group_id,
                });
            }
            Err(error) => {
                warn!("Mapping failed for tool '{}': {:#}", spec.name, error);
                summary.failed.push(RegistrationFailure {
                    tool_name: spec.name.clone(),
                    stage: RegistrationStage::Map,
                    error: format!("{:#}", error),
                });
            }
        }
    }

    // Publish once per run, and only when something actually changed.
    if !summary.succeeded.is_empty() {
        if let Err(error) = deployer.finalize().await {
            warn!("Preparing agent failed: {:#}", error);
            summary.finalize_error = Some(format!("{:#}", error));
        }
    }

    summary
}

/// Settings for the AWS-backed deployer.
#[derive(Debug, Clone)]
pub struct DeployerSettings {
    pub agent_id: String,
    /// Resource name prefix for deployed functions
    pub function_prefix: String,
    /// Bucket holding deployment packages
    pub bucket: String,
    /// Execution role attached to created functions
    pub role_arn: String,
}

/// [`ToolDeployer`] backed by Lambda, S3, and the Bedrock agent service.
pub struct AwsToolDeployer {
    lambda: lambda::Client,
    s3: s3::Client,
    agents: bedrockagent::Client,
    settings: DeployerSettings,
}

impl AwsToolDeployer {
    pub fn new(sdk_config: &aws_config::SdkConfig, settings: DeployerSettings) -> Self {
        Self {
            lambda: lambda::Client::new(sdk_config),
            s3: s3::Client::new(sdk_config),
            agents: bedrockagent::Client::new(sdk_config),
            settings,
        }
    }

    async fn upload_package(&self, function_name: &str, package: &[u8]) -> Result<String> {
        let zip_key = format!("lambda_resources/{}.zip", function_name);
        self.s3
            .put_object()
            .bucket(&self.settings.bucket)
            .key(&zip_key)
            .body(ByteStream::from(package.to_vec()))
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to upload package to s3://{}/{}",
                    self.settings.bucket, zip_key
                )
            })?;
        info!("Uploaded package to s3://{}/{}", self.settings.bucket, zip_key);
        Ok(zip_key)
    }

    async fn function_exists(&self, function_name: &str) -> Result<bool> {
        match self
            .lambda
            .get_function()
            .function_name(function_name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error) => {
                let not_found = error
                    .as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false);
                if not_found {
                    Ok(false)
                } else {
                    Err(error).with_context(|| format!("Failed to probe function {}", function_name))
                }
            }
        }
    }

    /// Look up an existing action group for this tool on the DRAFT version.
    async fn find_action_group(&self, group_name: &str) -> Result<Option<String>> {
        let mut paginator = self
            .agents
            .list_agent_action_groups()
            .agent_id(&self.settings.agent_id)
            .agent_version(AGENT_DRAFT_VERSION)
            .into_paginator()
            .send();

        while let Some(page) = paginator.next().await {
            let page = page.context("Failed to list agent action groups")?;
            for group in page.action_group_summaries() {
                if group.action_group_name() == group_name {
                    return Ok(Some(group.action_group_id().to_string()));
                }
            }
        }
        Ok(None)
    }

    fn function_schema(spec: &ToolSpec) -> Result<bedrockagent::types::FunctionSchema> {
        let mut parameters = HashMap::new();
        for parameter in &spec.parameters {
            let detail = bedrockagent::types::ParameterDetail::builder()
                .description(&parameter.description)
                .r#type(parameter_type(parameter.parameter_type))
                .required(parameter.required)
                .build()
                .with_context(|| {
                    format!("Failed to build parameter '{}' schema", parameter.name)
                })?;
            parameters.insert(parameter.name.clone(), detail);
        }

        let function = bedrockagent::types::Function::builder()
            .name(&spec.name)
            .description(&spec.description)
            .set_parameters(Some(parameters))
            .build()
            .with_context(|| format!("Failed to build function schema for '{}'", spec.name))?;

        Ok(bedrockagent::types::FunctionSchema::Functions(vec![
            function,
        ]))
    }
}

fn parameter_type(parameter_type: ParameterType) -> bedrockagent::types::Type {
    match parameter_type {
        ParameterType::String => bedrockagent::types::Type::String,
        ParameterType::Number => bedrockagent::types::Type::Number,
        ParameterType::Integer => bedrockagent::types::Type::Integer,
        ParameterType::Boolean => bedrockagent::types::Type::Boolean,
        ParameterType::Array => bedrockagent::types::Type::Array,
    }
}

#[async_trait]
impl ToolDeployer for AwsToolDeployer {
    async fn ensure_function(&self, spec: &ToolSpec, package: &[u8]) -> Result<DeployedFunction> {
        let function_name = spec.function_name(&self.settings.function_prefix);
        let zip_key = self.upload_package(&function_name, package).await?;

        if self.function_exists(&function_name).await? {
            let response = self
                .lambda
                .update_function_code()
                .function_name(&function_name)
                .s3_bucket(&self.settings.bucket)
                .s3_key(&zip_key)
                .publish(true)
                .send()
                .await
                .with_context(|| format!("Failed to update function {}", function_name))?;

            let arn = response
                .function_arn()
                .context("Update response did not include a function ARN")?
                .to_string();
            Ok(DeployedFunction {
                name: function_name,
                arn,
                updated: true,
            })
        } else {
            let code = lambda::types::FunctionCode::builder()
                .s3_bucket(&self.settings.bucket)
                .s3_key(&zip_key)
                .build();

            let response = self
                .lambda
                .create_function()
                .function_name(&function_name)
                .description(&spec.description)
                .runtime(lambda::types::Runtime::from(LAMBDA_RUNTIME))
                .handler(LAMBDA_HANDLER)
                .role(&self.settings.role_arn)
                .timeout(LAMBDA_TIMEOUT_SECS)
                .publish(true)
                .code(code)
                .send()
                .await
                .with_context(|| format!("Failed to create function {}", function_name))?;

            let arn = response
                .function_arn()
                .context("Create response did not include a function ARN")?
                .to_string();
            Ok(DeployedFunction {
                name: function_name,
                arn,
                updated: false,
            })
        }
    }

    async fn map_action(&self, spec: &ToolSpec, function: &DeployedFunction) -> Result<String> {
        let schema = Self::function_schema(spec)?;
        let executor =
            bedrockagent::types::ActionGroupExecutor::Lambda(function.arn.clone());

        match self.find_action_group(&spec.name).await? {
            Some(action_group_id) => {
                self.agents
                    .update_agent_action_group()
                    .agent_id(&self.settings.agent_id)
                    .agent_version(AGENT_DRAFT_VERSION)
                    .action_group_id(&action_group_id)
                    .action_group_name(&spec.name)
                    .description(&spec.description)
                    .action_group_executor(executor)
                    .function_schema(schema)
                    .send()
                    .await
                    .with_context(|| {
                        format!("Failed to update action group for tool '{}'", spec.name)
                    })?;
                Ok(action_group_id)
            }
            None => {
                let response = self
                    .agents
                    .create_agent_action_group()
                    .agent_id(&self.settings.agent_id)
                    .agent_version(AGENT_DRAFT_VERSION)
                    .action_group_name(&spec.name)
                    .description(&spec.description)
                    .action_group_executor(executor)
                    .function_schema(schema)
                    .send()
                    .await
                    .with_context(|| {
                        format!("Failed to create action group for tool '{}'", spec.name)
                    })?;

                let group = response
                    .agent_action_group()
                    .context("Create response did not include the action group")?;
                Ok(group.action_group_id().to_string())
            }
        }
    }

    async fn finalize(&self) -> Result<()> {
        self.agents
            .prepare_agent()
            .agent_id(&self.settings.agent_id)
            .send()
            .await
            .with_context(|| format!("Failed to prepare agent {}", self.settings.agent_id))?;
        info!("Prepared agent {}", self.settings.agent_id);
        Ok(())
    }
}

/// Facade tying config, deployer, and the registration sequence together.
pub struct ActionRegistrar {
    deployer: AwsToolDeployer,
}

impl ActionRegistrar {
    pub fn new(sdk_config: &aws_config::SdkConfig, settings: DeployerSettings) -> Self {
        Self {
            deployer: AwsToolDeployer::new(sdk_config, settings),
        }
    }

    pub async fn register(&self, specs: &[ToolSpec]) -> RegistrationSummary {
        register_tools(&self.deployer, specs).await
    }
}
