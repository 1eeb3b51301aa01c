//! egui chat frontend for the Bedrock agent.
//!
//! Pure presentation over an append-only conversation: one blocking request
//! is in flight at a time, run on a background thread that owns its own
//! tokio runtime and reports back over an mpsc channel. The UI thread only
//! appends turns and re-renders.

mod worker;

use std::collections::HashMap;
use std::sync::mpsc;

use egui::{Color32, ColorImage, RichText, TextureHandle, TextureOptions};
use tracing::error;

use crate::app::config::AgentDeckConfig;
use crate::app::conversation::{
    ArtifactRef, Conversation, ConversationRole, ConversationTurn,
};
use worker::{spawn_request_worker, PendingUpload, WorkerEvent};

/// Starter prompts shown before the first turn.
const SAMPLE_QUESTIONS: [&str; 4] = [
    "What are the best practices for cloud security?",
    "Can you draw an AWS diagram that shows an ecommerce architecture",
    "What are the top 5 stories from https://aws.amazon.com/blogs/aws/",
    "Can you create a lambda function that can do sentiment analysis on text?",
];

const MAX_IMAGE_WIDTH: f32 = 420.0;

/// The chat window application.
pub struct ChatApp {
    config: AgentDeckConfig,
    conversation: Conversation,
    input: String,
    /// Path of an image to attach to the next utterance
    upload_path: String,
    show_samples: bool,
    /// A request worker is running; input is disabled until it reports back
    pending: bool,
    receiver: Option<mpsc::Receiver<WorkerEvent>>,
    /// Fetched bytes per remote artifact key
    artifact_bytes: HashMap<String, Result<Vec<u8>, String>>,
    /// Decoded textures per artifact cache key
    textures: HashMap<String, Result<TextureHandle, String>>,
}

impl ChatApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AgentDeckConfig) -> Self {
        Self {
            config,
            conversation: Conversation::new(),
            input: String::new(),
            upload_path: String::new(),
            show_samples: true,
            pending: false,
            receiver: None,
            artifact_bytes: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    fn submit(&mut self, prompt: String) {
        if prompt.trim().is_empty() || self.pending {
            return;
        }
        self.show_samples = false;

        // Read the attached image up front so the user turn can show it
        // immediately; the worker uploads it and appends the URL.
        let mut upload = None;
        let mut user_turn = ConversationTurn::user(prompt.clone());
        if !self.upload_path.trim().is_empty() {
            let path = std::path::PathBuf::from(self.upload_path.trim());
            match std::fs::read(&path) {
                Ok(bytes) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "upload.png".to_string());
                    user_turn = user_turn.with_artifacts(vec![ArtifactRef::Inline {
                        name: name.clone(),
                        bytes: bytes.clone(),
                    }]);
                    upload = Some(PendingUpload { name, bytes });
                }
                Err(e) => {
                    self.conversation.push(ConversationTurn::error(format!(
                        "Could not read image {}: {}",
                        path.display(),
                        e
                    )));
                    return;
                }
            }
        }
        self.conversation.push(user_turn);
        self.upload_path.clear();

        let (sender, receiver) = mpsc::channel();
        self.receiver = Some(receiver);
        self.pending = true;
        spawn_request_worker(
            self.config.clone(),
            prompt,
            upload,
            self.conversation.session_id().to_string(),
            sender,
        );
    }

    fn drain_worker_events(&mut self) {
        let Some(receiver) = &self.receiver else {
            return;
        };
        let mut done = false;
        while let Ok(event) = receiver.try_recv() {
            match event {
                WorkerEvent::Reply { reply, resolved } => {
                    for artifact in resolved {
                        self.artifact_bytes.insert(artifact.key, artifact.result);
                    }
                    self.conversation.push(
                        ConversationTurn::agent(reply.text)
                            .with_artifacts(reply.artifacts)
                            .with_traces(reply.traces),
                    );
                    done = true;
                }
                WorkerEvent::Error(message) => {
                    // The conversation continues after an error turn.
                    self.conversation.push(ConversationTurn::error(message));
                    done = true;
                }
            }
        }
        if done {
            self.pending = false;
            self.receiver = None;
        }
    }

    fn clear_conversation(&mut self) {
        self.conversation.clear();
        self.artifact_bytes.clear();
        self.textures.clear();
        self.show_samples = true;
        self.pending = false;
        self.receiver = None;
    }

    fn texture_for(
        ctx: &egui::Context,
        textures: &mut HashMap<String, Result<TextureHandle, String>>,
        cache_key: &str,
        bytes: &[u8],
    ) -> Result<TextureHandle, String> {
        if let Some(cached) = textures.get(cache_key) {
            return cached.clone();
        }
        let result = match image::load_from_memory(bytes) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let size = [rgba.width() as usize, rgba.height() as usize];
                let pixels = rgba.as_flat_samples();
                let color_image = ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
                Ok(ctx.load_texture(
                    format!("artifact_{}", cache_key),
                    color_image,
                    TextureOptions::default(),
                ))
            }
            Err(e) => {
                error!("Failed to decode artifact {}: {}", cache_key, e);
                Err(format!("could not decode image: {}", e))
            }
        };
        textures.insert(cache_key.to_string(), result.clone());
        result
    }

    fn show_artifact(
        ui: &mut egui::Ui,
        textures: &mut HashMap<String, Result<TextureHandle, String>>,
        artifact_bytes: &HashMap<String, Result<Vec<u8>, String>>,
        turn_index: usize,
        artifact: &ArtifactRef,
    ) {
        let cache_key = artifact_cache_key(turn_index, artifact);

        // Cache hit renders without touching the source bytes at all.
        let texture = match textures.get(&cache_key) {
            Some(cached) => cached.clone(),
            None => {
                let bytes = match artifact {
                    ArtifactRef::Inline { bytes, .. } => Ok(bytes.as_slice()),
                    ArtifactRef::Remote { key, .. } => resolved_bytes(artifact_bytes, key),
                };
                bytes.and_then(|b| Self::texture_for(ui.ctx(), textures, &cache_key, b))
            }
        };

        match texture {
            Ok(texture) => {
                ui.add(egui::Image::new(&texture).max_width(MAX_IMAGE_WIDTH));
            }
            Err(message) => {
                // Error placeholder instead of a crash for dangling keys
                ui.label(
                    RichText::new(format!("⚠ {} ({})", message, artifact.label()))
                        .color(Color32::from_rgb(220, 120, 60)),
                );
            }
        }
    }

    fn show_turn(&mut self, ui: &mut egui::Ui, turn_index: usize) {
        let Self {
            conversation,
            textures,
            artifact_bytes,
            ..
        } = self;
        let turn = &conversation.turns()[turn_index];
        let dark_mode = ui.visuals().dark_mode;
        let (icon, heading_color) = match (turn.role, turn.is_error) {
            (_, true) => ("⚠", Color32::from_rgb(230, 80, 80)),
            (ConversationRole::User, _) => (
                "👤",
                if dark_mode {
                    Color32::from_rgb(100, 150, 255)
                } else {
                    Color32::from_rgb(50, 75, 150)
                },
            ),
            (ConversationRole::Agent, _) => (
                "⚡",
                if dark_mode {
                    Color32::from_rgb(100, 255, 150)
                } else {
                    Color32::from_rgb(50, 150, 75)
                },
            ),
        };

        ui.horizontal(|ui| {
            ui.label(RichText::new(icon).color(heading_color));
            ui.vertical(|ui| {
                for (trace_index, trace) in turn.traces.iter().enumerate() {
                    egui::CollapsingHeader::new(trace.kind.to_string())
                        .id_salt((turn_index, trace_index))
                        .show(ui, |ui| {
                            ui.monospace(&trace.text);
                        });
                }
                if turn.is_error {
                    ui.label(RichText::new(&turn.text).color(heading_color));
                } else {
                    ui.label(&turn.text);
                }
                for artifact in &turn.artifacts {
                    Self::show_artifact(ui, textures, artifact_bytes, turn_index, artifact);
                }
            });
        });
        ui.add_space(8.0);
    }
}

/// Texture cache key for an artifact. Stable across frames so a decoded
/// image is only ever decoded once.
fn artifact_cache_key(turn_index: usize, artifact: &ArtifactRef) -> String {
    match artifact {
        ArtifactRef::Inline { name, .. } => format!("inline_{}_{}", turn_index, name),
        ArtifactRef::Remote { key, .. } => key.clone(),
    }
}

/// Look up fetched bytes for a remote artifact key. A key the worker never
/// resolved, or whose fetch failed, becomes the placeholder message.
fn resolved_bytes<'a>(
    artifact_bytes: &'a HashMap<String, Result<Vec<u8>, String>>,
    key: &str,
) -> Result<&'a [u8], String> {
    match artifact_bytes.get(key) {
        Some(Ok(bytes)) => Ok(bytes.as_slice()),
        Some(Err(e)) => Err(e.clone()),
        None => Err("image not available".to_string()),
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_worker_events();
        if self.pending {
            // Poll the worker channel even when no input arrives
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        egui::SidePanel::left("controls").show(ctx, |ui| {
            ui.heading("agentdeck");
            ui.label("An agentic chatbot powered by Amazon Bedrock.");
            ui.separator();

            ui.label("Attach image (path):");
            ui.text_edit_singleline(&mut self.upload_path);
            ui.add_space(8.0);

            if ui.button("Clear Conversation").clicked() {
                self.clear_conversation();
            }
            ui.add_space(8.0);
            ui.label(format!("Session: {}", self.conversation.session_id()));
        });

        egui::TopBottomPanel::bottom("input").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                let input = ui.add_enabled(
                    !self.pending,
                    egui::TextEdit::singleline(&mut self.input)
                        .hint_text("How can I help?")
                        .desired_width(ui.available_width() - 70.0),
                );
                let send_clicked =
                    ui.add_enabled(!self.pending, egui::Button::new("Send")).clicked();
                let enter_pressed = input.lost_focus()
                    && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if send_clicked || enter_pressed {
                    let prompt = std::mem::take(&mut self.input);
                    self.submit(prompt);
                }
            });
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.show_samples && self.conversation.is_empty() {
                ui.label("Try asking one of these questions:");
                ui.add_space(4.0);
                let mut chosen = None;
                egui::Grid::new("sample_questions").num_columns(2).show(ui, |ui| {
                    for (i, question) in SAMPLE_QUESTIONS.iter().enumerate() {
                        if ui.button(*question).clicked() {
                            chosen = Some(question.to_string());
                        }
                        if i % 2 == 1 {
                            ui.end_row();
                        }
                    }
                });
                if let Some(question) = chosen {
                    self.submit(question);
                }
                ui.separator();
            }

            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for turn_index in 0..self.conversation.turns().len() {
                        self.show_turn(ui, turn_index);
                    }
                    if self.pending {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Waiting for the agent...");
                        });
                    }
                });
        });
    }
}
