#![warn(clippy::all, rust_2018_idioms)]

use tracing_subscriber::prelude::*;

use agentdeck::app::config::AgentDeckConfig;
use agentdeck::ChatApp;

fn init_logging() {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "", "agentdeck") {
        let log_dir = proj_dirs.data_dir().join("logs");
        let _ = std::fs::create_dir_all(&log_dir);
        let log_path = log_dir.join("agentdeck.log");

        let file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)
            .expect("Failed to open log file");

        // AWS SDK internals are noisy at info; keep them at warn
        let filter = tracing_subscriber::EnvFilter::builder()
            .parse(
                "agentdeck=info,eframe=info,egui=warn,winit=warn,\
                 aws_config=warn,aws_sigv4=warn,aws_smithy_runtime=warn,\
                 aws_smithy_runtime_api=warn,aws_smithy_http=warn,hyper=warn",
            )
            .expect("Failed to parse env filter");

        let subscriber = tracing_subscriber::registry().with(filter).with(
            tracing_subscriber::fmt::layer()
                .with_writer(move || file.try_clone().expect("Failed to clone file handle"))
                .with_ansi(false),
        );

        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");

        // Bridge log crate events (eframe, egui, rustls, ...) into tracing
        tracing_log::LogTracer::init().expect("Failed to initialize log-to-tracing bridge");

        tracing::info!("Logging initialized to: {:?}", log_path);
    }
}

fn setup_panic_handler() {
    // Panics in a GUI process are easy to lose; keep a crash log next to the
    // normal one.
    std::panic::set_hook(Box::new(|panic_info| {
        let crash_msg = format!(
            "agentdeck crashed!\nPanic occurred at: {}\nDetails: {}\n",
            panic_info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string()),
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(|s| s.as_str()))
                .unwrap_or("unknown panic"),
        );

        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "", "agentdeck") {
            let log_dir = proj_dirs.data_dir().join("logs");
            let _ = std::fs::create_dir_all(&log_dir);
            let crash_log_path = log_dir.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&crash_log_path)
            {
                use std::io::Write;
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "\n=== CRASH at {} ===\n{}", timestamp, crash_msg);
            }
        }
        eprintln!("\n{}", crash_msg);
    }));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_panic_handler();
    init_logging();

    tracing::info!(
        "agentdeck starting (build {}@{})",
        env!("GIT_BRANCH"),
        env!("GIT_COMMIT")
    );

    let config = match AgentDeckConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            if let Some(path) = AgentDeckConfig::default_path() {
                eprintln!(
                    "Create {} with at least {{\"agent_id\": ..., \"artifact_bucket\": ...}}",
                    path.display()
                );
            }
            std::process::exit(2);
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 680.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "agentdeck",
        native_options,
        Box::new(|cc| Ok(Box::new(ChatApp::new(cc, config)))),
    )?;

    Ok(())
}
