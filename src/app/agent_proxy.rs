//! Blocking round-trips against the Bedrock agent runtime.
//!
//! One call per user utterance: send the text plus a session identifier,
//! drain the completion event stream, and hand back the aggregated reply.
//! The agent may invoke any number of registered tools server-side; this
//! proxy only sees the final response plus whatever trace events the runtime
//! chooses to surface. No retry or backoff beyond the SDK defaults.

use crate::app::artifact_store::parse_object_url;
use crate::app::conversation::{ArtifactRef, TraceEvent, TraceKind};
use anyhow::{Context, Result};
use aws_sdk_bedrockagentruntime as agentruntime;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static S3_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://[\w\-.]+\.s3\.amazonaws\.com/[\w\-./]+")
        .expect("Failed to compile S3 URL regex")
});

/// Aggregated response from one agent round-trip.
#[derive(Debug, Default)]
pub struct AgentReply {
    pub text: String,
    pub artifacts: Vec<ArtifactRef>,
    pub traces: Vec<TraceEvent>,
}

/// Client wrapper around the Bedrock agent runtime.
pub struct AgentProxy {
    client: agentruntime::Client,
    agent_id: String,
    agent_alias_id: String,
}

impl AgentProxy {
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        agent_id: impl Into<String>,
        agent_alias_id: impl Into<String>,
    ) -> Self {
        Self {
            client: agentruntime::Client::new(sdk_config),
            agent_id: agent_id.into(),
            agent_alias_id: agent_alias_id.into(),
        }
    }

    /// Send one utterance and collect the full response.
    pub async fn invoke(&self, utterance: &str, session_id: &str) -> Result<AgentReply> {
        debug!(
            "Invoking agent {} (alias {}) for session {}",
            self.agent_id, self.agent_alias_id, session_id
        );

        let response = self
            .client
            .invoke_agent()
            .agent_id(&self.agent_id)
            .agent_alias_id(&self.agent_alias_id)
            .session_id(session_id)
            .input_text(utterance)
            .enable_trace(true)
            .send()
            .await
            .with_context(|| format!("Failed to invoke agent {}", self.agent_id))?;

        let mut reply = AgentReply::default();
        let mut stream = response.completion;

        while let Some(event) = stream
            .recv()
            .await
            .context("Error reading agent response stream")?
        {
            match event {
                agentruntime::types::ResponseStream::Chunk(payload) => {
                    if let Some(bytes) = payload.bytes {
                        reply
                            .text
                            .push_str(&String::from_utf8_lossy(bytes.as_ref()));
                    }
                }
                agentruntime::types::ResponseStream::Files(file_part) => {
                    for file in file_part.files.unwrap_or_default() {
                        let name = file
                            .name
                            .unwrap_or_else(|| "artifact.bin".to_string());
                        match file.bytes {
                            Some(bytes) => reply.artifacts.push(ArtifactRef::Inline {
                                name,
                                bytes: bytes.into_inner(),
                            }),
                            None => warn!("Agent returned file '{}' without bytes", name),
                        }
                    }
                }
                agentruntime::types::ResponseStream::Trace(trace_part) => {
                    if let Some(trace) = trace_part.trace {
                        collect_trace_events(&trace, &mut reply.traces);
                    }
                }
                _ => {}
            }
        }

        // Tool output often arrives as object URLs embedded in the final text
        // rather than inline file events.
        for (bucket, key) in extract_image_refs(&reply.text) {
            reply.artifacts.push(ArtifactRef::Remote { bucket, key });
        }

        debug!(
            "Agent reply: {} chars, {} artifacts, {} trace events",
            reply.text.len(),
            reply.artifacts.len(),
            reply.traces.len()
        );
        Ok(reply)
    }
}

/// Extract (bucket, key) pairs for every S3 object URL in the reply text.
pub fn extract_image_refs(text: &str) -> Vec<(String, String)> {
    S3_URL_RE
        .find_iter(text)
        .filter_map(|m| parse_object_url(m.as_str()))
        .collect()
}

/// Flatten the subset of trace events the frontend displays.
fn collect_trace_events(trace: &agentruntime::types::Trace, out: &mut Vec<TraceEvent>) {
    use agentruntime::types::Trace;

    match trace {
        Trace::OrchestrationTrace(orchestration) => {
            collect_orchestration_events(orchestration, out)
        }
        Trace::GuardrailTrace(guardrail) => collect_guardrail_events(guardrail, out),
        _ => {}
    }
}

fn collect_orchestration_events(
    orchestration: &agentruntime::types::OrchestrationTrace,
    out: &mut Vec<TraceEvent>,
) {
    use agentruntime::types::OrchestrationTrace;

    match orchestration {
        OrchestrationTrace::Rationale(rationale) => {
            if let Some(text) = &rationale.text {
                out.push(TraceEvent::new(TraceKind::Rationale, text));
            }
        }
        OrchestrationTrace::InvocationInput(input) => {
            if let Some(code) = input
                .code_interpreter_invocation_input
                .as_ref()
                .and_then(|c| c.code.as_deref())
            {
                out.push(TraceEvent::new(TraceKind::CodeInterpreter, code));
            }
            if let Some(query) = input
                .knowledge_base_lookup_input
                .as_ref()
                .and_then(|k| k.text.as_deref())
            {
                out.push(TraceEvent::new(TraceKind::KnowledgeBaseLookup, query));
            }
            if let Some(function) = input
                .action_group_invocation_input
                .as_ref()
                .and_then(|a| a.function.as_deref())
            {
                out.push(TraceEvent::new(
                    TraceKind::ActionGroupInvocation,
                    format!("Calling function: {}", function),
                ));
            }
        }
        OrchestrationTrace::Observation(observation) => {
            if let Some(output) = &observation.code_interpreter_invocation_output {
                if let Some(text) = output.execution_output.as_deref() {
                    out.push(TraceEvent::new(TraceKind::Observation, text));
                }
                if let Some(error) = output.execution_error.as_deref() {
                    out.push(TraceEvent::new(TraceKind::Observation, error));
                }
            }
            if let Some(text) = observation
                .action_group_invocation_output
                .as_ref()
                .and_then(|a| a.text.as_deref())
            {
                out.push(TraceEvent::new(TraceKind::Observation, text));
            }
            if let Some(lookup) = &observation.knowledge_base_lookup_output {
                let references: Vec<String> = lookup
                    .retrieved_references
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|r| r.content.as_ref().map(|c| c.text.clone()))
                    .collect();
                if !references.is_empty() {
                    out.push(TraceEvent::new(
                        TraceKind::KnowledgeBaseLookup,
                        references.join("\n"),
                    ));
                }
            }
            if let Some(text) = observation
                .final_response
                .as_ref()
                .and_then(|f| f.text.as_deref())
            {
                out.push(TraceEvent::new(TraceKind::FinalResponse, text));
            }
        }
        _ => {}
    }
}

/// Surface blocked topics and content filters from guardrail assessments.
fn collect_guardrail_events(
    guardrail: &agentruntime::types::GuardrailTrace,
    out: &mut Vec<TraceEvent>,
) {
    let mut lines = Vec::new();
    for assessment in guardrail
        .input_assessments()
        .iter()
        .chain(guardrail.output_assessments().iter())
    {
        if let Some(policy) = assessment.topic_policy() {
            for topic in policy.topics() {
                if let Some(name) = topic.name() {
                    lines.push(format!("Blocked topic: {}", name));
                }
            }
        }
        if let Some(policy) = assessment.content_policy() {
            for filter in policy.filters() {
                if let Some(kind) = filter.r#type() {
                    lines.push(format!("Blocked content: {}", kind.as_str()));
                }
            }
        }
    }
    if !lines.is_empty() {
        out.push(TraceEvent::new(TraceKind::Guardrail, lines.join("\n")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_image_refs() {
        let text = "Here is your diagram: \
            https://demo-bucket.s3.amazonaws.com/uploaded_images/20250101_abcd1234_arch.png \
            and some text after.";
        let refs = extract_image_refs(text);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0, "demo-bucket");
        assert_eq!(refs[0].1, "uploaded_images/20250101_abcd1234_arch.png");
    }

    #[test]
    fn test_text_only_reply_has_no_refs() {
        let refs = extract_image_refs("The top five stories are all about S3 pricing.");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_non_s3_urls_ignored() {
        let refs = extract_image_refs("See https://aws.amazon.com/blogs/aws/ for details");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_rationale_trace_collected() {
        let rationale = agentruntime::types::Rationale::builder()
            .text("I should call the diagram tool")
            .build();
        let trace = agentruntime::types::Trace::OrchestrationTrace(
            agentruntime::types::OrchestrationTrace::Rationale(rationale),
        );

        let mut events = Vec::new();
        collect_trace_events(&trace, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TraceKind::Rationale);
        assert_eq!(events[0].text, "I should call the diagram tool");
    }

    #[test]
    fn test_guardrail_assessments_surfaced() {
        let assessment = agentruntime::types::GuardrailAssessment::builder()
            .topic_policy(
                agentruntime::types::GuardrailTopicPolicyAssessment::builder()
                    .topics(
                        agentruntime::types::GuardrailTopic::builder()
                            .name("financial-advice")
                            .build(),
                    )
                    .build(),
            )
            .build();
        let trace = agentruntime::types::Trace::GuardrailTrace(
            agentruntime::types::GuardrailTrace::builder()
                .input_assessments(assessment)
                .build(),
        );

        let mut events = Vec::new();
        collect_trace_events(&trace, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TraceKind::Guardrail);
        assert_eq!(events[0].text, "Blocked topic: financial-advice");
    }

    #[test]
    fn test_guardrail_without_assessments_emits_nothing() {
        let trace = agentruntime::types::Trace::GuardrailTrace(
            agentruntime::types::GuardrailTrace::builder().build(),
        );
        let mut events = Vec::new();
        collect_trace_events(&trace, &mut events);
        assert!(events.is_empty());
    }
}
