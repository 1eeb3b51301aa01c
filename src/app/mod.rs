//! Core application modules for agentdeck.
//!
//! # Module Organization
//!
//! ## Agent integration
//! - [`agent_proxy`] - Blocking round-trips against the Bedrock agent runtime
//! - [`artifact_store`] - S3-backed image/diagram storage keyed by generated names
//!
//! ## Tool registration
//! - [`tool_spec`] - Tool descriptors loaded from the tools definition file
//! - [`packaging`] - Lambda deployment package (zip) construction
//! - [`registrar`] - Create-or-update Lambda functions and agent action groups
//!
//! ## UI and Infrastructure
//! - [`chatui`] - The chat window and its background request worker
//! - [`conversation`] - Append-only conversation history
//! - [`config`] - Application configuration and AWS SDK config construction

pub mod agent_proxy;
pub mod artifact_store;
pub mod chatui;
pub mod config;
pub mod conversation;
pub mod packaging;
pub mod registrar;
pub mod tool_spec;
