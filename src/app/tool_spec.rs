//! Tool specifications for agent action registration.
//!
//! A tools definition file is an ordered JSON array of tool specs. Each spec
//! names a Lambda handler package on disk and declares the parameter schema
//! the agent uses when invoking the tool. Specs are validated up front so
//! configuration errors fail before any cloud call is made.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Parameter types accepted by agent function schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
        }
    }
}

/// One named parameter in a tool's invocation schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// A tool the agent may invoke, backed by a Lambda handler package.
///
/// Immutable once loaded; registration derives all cloud resource names from
/// the tool name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Handler package: a directory containing `lambda_function.py` (plus any
    /// vendored dependencies), or a single handler source file.
    pub handler: PathBuf,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl ToolSpec {
    /// Derived name of the deployed function resource for this tool.
    pub fn function_name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.name)
    }
}

/// Load and validate an ordered collection of tool specs from a JSON file.
pub fn load_tool_specs(path: &Path) -> Result<Vec<ToolSpec>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tools file {}", path.display()))?;
    let specs: Vec<ToolSpec> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse tools file {}", path.display()))?;
    validate_tool_specs(&specs)?;
    Ok(specs)
}

/// Validate tool specs before any cloud call.
///
/// Rejects empty or malformed names, empty descriptions, malformed parameter
/// names, and two specs that would derive the same function resource name.
pub fn validate_tool_specs(specs: &[ToolSpec]) -> Result<()> {
    if specs.is_empty() {
        bail!("Tools file contains no tool specs");
    }

    let mut seen = HashSet::new();
    for spec in specs {
        if spec.name.is_empty() {
            bail!("Tool spec has an empty name");
        }
        if !is_valid_resource_name(&spec.name) {
            bail!(
                "Tool '{}' has an invalid name: only letters, digits, '_' and '-' are allowed (max 48 chars)",
                spec.name
            );
        }
        if spec.description.is_empty() {
            bail!("Tool '{}' has an empty description", spec.name);
        }
        for parameter in &spec.parameters {
            if parameter.name.is_empty() || !is_valid_resource_name(&parameter.name) {
                bail!(
                    "Tool '{}' has an invalid parameter name '{}'",
                    spec.name,
                    parameter.name
                );
            }
        }
        // Two specs deriving the same function name is a configuration error,
        // not a last-writer-wins upsert.
        if !seen.insert(spec.name.clone()) {
            bail!(
                "Tool '{}' is defined twice; derived function names must be unique",
                spec.name
            );
        }
    }

    Ok(())
}

fn is_valid_resource_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 48
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: format!("{} tool", name),
            handler: PathBuf::from("handlers").join(name),
            parameters: Vec::new(),
        }
    }

    #[test]
    fn test_parse_tools_file() {
        let raw = r#"[
            {
                "name": "caption",
                "description": "Describe an architecture diagram image",
                "handler": "handlers/caption",
                "parameters": [
                    {"name": "image_url", "type": "string", "description": "S3 URL of the image"}
                ]
            },
            {
                "name": "diagram",
                "description": "Generate an AWS architecture diagram",
                "handler": "handlers/diagram",
                "parameters": [
                    {"name": "diagram_code", "type": "string", "required": false}
                ]
            }
        ]"#;

        let specs: Vec<ToolSpec> = serde_json::from_str(raw).unwrap();
        validate_tool_specs(&specs).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "caption");
        assert_eq!(specs[0].parameters[0].parameter_type, ParameterType::String);
        // required defaults to true when omitted
        assert!(specs[0].parameters[0].required);
        assert!(!specs[1].parameters[0].required);
    }

    #[test]
    fn test_function_name_derivation() {
        assert_eq!(spec("caption").function_name("agentdeck"), "agentdeck-caption");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let specs = vec![spec("caption"), spec("diagram"), spec("caption")];
        let err = validate_tool_specs(&specs).unwrap_err();
        assert!(err.to_string().contains("defined twice"), "{}", err);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut bad = spec("caption");
        bad.name = "my tool!".to_string();
        assert!(validate_tool_specs(&[bad]).is_err());
    }

    #[test]
    fn test_empty_description_rejected() {
        let mut bad = spec("caption");
        bad.description.clear();
        assert!(validate_tool_specs(&[bad]).is_err());
    }

    #[test]
    fn test_empty_collection_rejected() {
        assert!(validate_tool_specs(&[]).is_err());
    }
}
