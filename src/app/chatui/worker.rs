//! Background request worker for the chat window.
//!
//! Each submitted utterance spawns one worker thread. The thread owns its own
//! tokio runtime, performs the optional image upload, the agent round-trip,
//! and the artifact fetches, then reports a single event back to the UI over
//! the channel. The UI never blocks.

use std::sync::mpsc;

use tracing::{error, warn};

use crate::app::agent_proxy::{AgentProxy, AgentReply};
use crate::app::artifact_store::ArtifactStore;
use crate::app::config::AgentDeckConfig;
use crate::app::conversation::ArtifactRef;

/// An image attached to the outgoing utterance.
pub struct PendingUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Bytes fetched for one remote artifact reference.
pub struct ResolvedArtifact {
    pub key: String,
    pub result: Result<Vec<u8>, String>,
}

/// Worker-to-UI events.
pub enum WorkerEvent {
    Reply {
        reply: AgentReply,
        resolved: Vec<ResolvedArtifact>,
    },
    Error(String),
}

/// Spawn the worker thread for one request.
pub fn spawn_request_worker(
    config: AgentDeckConfig,
    prompt: String,
    upload: Option<PendingUpload>,
    session_id: String,
    sender: mpsc::Sender<WorkerEvent>,
) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to create tokio runtime for request worker: {}", e);
                let _ = sender.send(WorkerEvent::Error(format!(
                    "Failed to create async runtime: {}",
                    e
                )));
                return;
            }
        };

        let outcome = runtime.block_on(run_request(config, prompt, upload, session_id));
        let event = match outcome {
            Ok((reply, resolved)) => WorkerEvent::Reply { reply, resolved },
            Err(e) => WorkerEvent::Error(format!("{:#}", e)),
        };
        if sender.send(event).is_err() {
            warn!("UI dropped the worker channel before the reply arrived");
        }
    });
}

async fn run_request(
    config: AgentDeckConfig,
    prompt: String,
    upload: Option<PendingUpload>,
    session_id: String,
) -> anyhow::Result<(AgentReply, Vec<ResolvedArtifact>)> {
    let sdk_config = config.sdk_config().await;
    let proxy = AgentProxy::new(&sdk_config, &config.agent_id, &config.agent_alias_id);
    let store = ArtifactStore::new(&sdk_config, &config.artifact_bucket);

    let mut prompt = prompt;
    if let Some(upload) = upload {
        let stored = store.put_image(upload.bytes, &upload.name).await?;
        prompt = format!("{}\nhere is the image: {}", prompt, stored.url);
    }

    let reply = proxy.invoke(&prompt, &session_id).await?;

    // Resolve remote references now so rendering never blocks; a missing key
    // becomes an error placeholder, not a failed turn.
    let mut resolved = Vec::new();
    for artifact in &reply.artifacts {
        if let ArtifactRef::Remote { bucket, key } = artifact {
            let result = store
                .fetch(bucket, key)
                .await
                .map_err(|e| format!("{:#}", e));
            if let Err(e) = &result {
                warn!("Failed to fetch artifact {}: {}", key, e);
            }
            resolved.push(ResolvedArtifact {
                key: key.clone(),
                result,
            });
        }
    }

    Ok((reply, resolved))
}
