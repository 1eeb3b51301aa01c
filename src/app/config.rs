//! Application configuration.
//!
//! All components receive configuration explicitly at construction; nothing
//! reads module-level globals. The config file lives under the platform
//! config directory and individual fields can be overridden by CLI flags.

use anyhow::{bail, Context, Result};
use aws_config::BehaviorVersion;
use aws_types::region::Region;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_AGENT_ALIAS: &str = "TSTALIASID";
pub const DEFAULT_FUNCTION_PREFIX: &str = "agentdeck";

/// Configuration shared by the chat frontend and the registrar CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDeckConfig {
    /// Identifier of the managed agent
    pub agent_id: String,
    #[serde(default = "default_agent_alias")]
    pub agent_alias_id: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Named credential profile; falls back to the default provider chain
    #[serde(default)]
    pub profile: Option<String>,
    /// Bucket for uploaded images, generated diagrams, and deployment packages
    pub artifact_bucket: String,
    /// Execution role for functions created by the registrar
    #[serde(default)]
    pub lambda_role_arn: String,
    #[serde(default = "default_function_prefix")]
    pub function_prefix: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_agent_alias() -> String {
    DEFAULT_AGENT_ALIAS.to_string()
}

fn default_function_prefix() -> String {
    DEFAULT_FUNCTION_PREFIX.to_string()
}

impl AgentDeckConfig {
    /// Default config file location under the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "", "agentdeck")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load from the default location.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()
            .context("Could not determine the platform config directory")?;
        Self::load_from(&path)
    }

    /// Load and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config file {} (create it with agent_id and artifact_bucket)",
                path.display()
            )
        })?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject incomplete configuration before any external call is made.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.is_empty() {
            bail!("Configuration is missing agent_id");
        }
        if self.artifact_bucket.is_empty() {
            bail!("Configuration is missing artifact_bucket");
        }
        if self.region.is_empty() {
            bail!("Configuration has an empty region");
        }
        Ok(())
    }

    /// Build the shared AWS SDK config for this region/profile.
    pub async fn sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: AgentDeckConfig = serde_json::from_str(
            r#"{"agent_id": "AGENT123", "artifact_bucket": "demo-bucket"}"#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.agent_alias_id, DEFAULT_AGENT_ALIAS);
        assert_eq!(config.function_prefix, DEFAULT_FUNCTION_PREFIX);
        assert!(config.profile.is_none());
    }

    #[test]
    fn test_missing_agent_id_rejected() {
        let config: AgentDeckConfig = serde_json::from_str(
            r#"{"agent_id": "", "artifact_bucket": "demo-bucket"}"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_bucket_rejected() {
        let config: AgentDeckConfig =
            serde_json::from_str(r#"{"agent_id": "AGENT123", "artifact_bucket": ""}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "agent_id": "AGENT123",
                "artifact_bucket": "demo-bucket",
                "region": "us-east-1",
                "profile": "workshop"
            }"#,
        )
        .unwrap();

        let config = AgentDeckConfig::load_from(&path).unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.profile.as_deref(), Some("workshop"));
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(AgentDeckConfig::load_from(&path).is_err());
    }
}
