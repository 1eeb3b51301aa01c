//! agentdeck - a desktop workbench around an Amazon Bedrock agent.
//!
//! The application wires three pieces together:
//!
//! - **Action registrar** ([`app::registrar`]): deploys each configured tool as
//!   an AWS Lambda function and registers it as an action group on the agent,
//!   with per-tool failure isolation and an aggregated summary. Exposed as the
//!   `agentdeck-register` binary.
//! - **Agent proxy** ([`app::agent_proxy`]): one blocking round-trip per user
//!   utterance against the Bedrock agent runtime, relaying text, artifact
//!   references, and orchestration traces.
//! - **Chat frontend** ([`app::chatui`]): an egui window rendering the ordered
//!   conversation, fetching referenced images from S3 and showing generated
//!   artifacts inline.
//!
//! All reasoning and tool orchestration happens server-side in the managed
//! agent service; this crate contains no local planner. Durable state lives in
//! AWS (Lambda, S3, the agent configuration), so the process itself is a thin
//! request/response client.

#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub use app::chatui::ChatApp;
