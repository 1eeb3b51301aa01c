//! Append-only conversation history for the chat frontend.
//!
//! A conversation is an ordered list of turns tied to one agent session.
//! Turns are never mutated after creation; clearing the conversation starts a
//! fresh agent session.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationRole {
    /// Input from the user
    User,
    /// Response from the agent
    Agent,
}

/// Reference to an image or other artifact attached to a turn.
#[derive(Debug, Clone)]
pub enum ArtifactRef {
    /// Object in bucket storage, dereferenced by the frontend at render time
    Remote { bucket: String, key: String },
    /// Bytes returned inline in the agent response stream
    Inline { name: String, bytes: Vec<u8> },
}

impl ArtifactRef {
    /// Display name for the artifact (object key or inline file name).
    pub fn label(&self) -> &str {
        match self {
            ArtifactRef::Remote { key, .. } => key,
            ArtifactRef::Inline { name, .. } => name,
        }
    }
}

/// Kinds of orchestration trace events surfaced by the agent runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    Rationale,
    ActionGroupInvocation,
    KnowledgeBaseLookup,
    CodeInterpreter,
    Observation,
    FinalResponse,
    Guardrail,
}

impl std::fmt::Display for TraceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TraceKind::Rationale => "rationale",
            TraceKind::ActionGroupInvocation => "actionGroupInvocation",
            TraceKind::KnowledgeBaseLookup => "knowledgeBaseLookup",
            TraceKind::CodeInterpreter => "codeInterpreter",
            TraceKind::Observation => "observation",
            TraceKind::FinalResponse => "finalResponse",
            TraceKind::Guardrail => "guardrail",
        };
        f.write_str(label)
    }
}

/// A single trace event captured while the agent worked on a turn.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub kind: TraceKind,
    pub text: String,
}

impl TraceEvent {
    pub fn new(kind: TraceKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// A single turn in the conversation.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    pub text: String,
    pub artifacts: Vec<ArtifactRef>,
    pub traces: Vec<TraceEvent>,
    /// Agent invocation failures render as a visible error turn
    pub is_error: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a new user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::User,
            text: text.into(),
            artifacts: Vec::new(),
            traces: Vec::new(),
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a new agent turn.
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::Agent,
            ..Self::user(text)
        }
    }

    /// Create an error turn; the conversation continues after it.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::agent(text)
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<ArtifactRef>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_traces(mut self, traces: Vec<TraceEvent>) -> Self {
        self.traces = traces;
        self
    }
}

/// Ordered conversation history plus the agent session it belongs to.
#[derive(Debug, Clone)]
pub struct Conversation {
    session_id: String,
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            session_id: new_session_id(),
            turns: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Drop all turns and start a fresh agent session.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.session_id = new_session_id();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a random 15-digit session identifier, the format the agent
/// runtime expects from this frontend.
pub fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..15)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
