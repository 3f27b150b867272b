//! Prisma Server - Main Entry Point
//!
//! Loads the tracking models, connects to the diffusion service and serves
//! the viewer until Ctrl-C.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;

use prisma_server::api::{run_server, SharedState};
use prisma_server::diffusion::{HttpImageGenerator, Stylizer};
use prisma_server::events::EventBus;
use prisma_server::pipeline::{Pipeline, PipelineConfig};
use prisma_server::regen::{spawn_regeneration_loop, RegenerationGate, RegenerationPolicy};
use prisma_server::settings::ServerSettings;
use prisma_server::telemetry::{init_logging, LogConfig};
use prisma_server::tracking::{OnnxBodyTracker, TrackerWorker};

#[derive(Debug, Parser)]
#[command(name = "prisma-server", version, about = "Pose-aware diffusion stylization server")]
struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Start with auto-regeneration disabled
    #[arg(long)]
    no_auto_regenerate: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Write logs to this file instead of the console
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the effective settings to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let log_config = LogConfig {
        console_enabled: args.log_file.is_none(),
        file_path: args.log_file.clone(),
        json_format: args.log_json,
        ..LogConfig::default()
    };
    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Prisma Server v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = ServerSettings::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if args.no_auto_regenerate {
        settings.regeneration.auto_regenerate = false;
    }

    if let Some(path) = args.write_config {
        settings.save_to_file(&path)?;
        tracing::info!("Settings written to {}", path.display());
        return Ok(());
    }

    let tracker = OnnxBodyTracker::load(Path::new(&settings.server.model_dir), &settings.tracking)?;
    let worker = TrackerWorker::spawn(Box::new(tracker))?;

    let generator = HttpImageGenerator::new(&settings.diffusion)?;
    tracing::info!(endpoint = generator.endpoint(), "Diffusion service configured");
    let stylizer = Stylizer::new(Arc::new(generator), settings.diffusion.clone());

    let gate = RegenerationGate::new(RegenerationPolicy::new(
        settings.regeneration.interval(),
        settings.regeneration.auto_regenerate,
    ));
    let bus = EventBus::new();
    let pipeline = Pipeline::new(
        worker,
        stylizer,
        gate.clone(),
        bus.clone(),
        PipelineConfig::from_settings(&settings),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let regen_task = spawn_regeneration_loop(gate, bus, settings.regeneration.tick(), shutdown_rx.clone());

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let static_dir = PathBuf::from(&settings.server.static_dir);
    let mut server = tokio::spawn(async move {
        run_server(addr, SharedState::handle(pipeline), &static_dir, shutdown_rx).await
    });

    let server_result = tokio::select! {
        result = &mut server => Some(result),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutdown requested");
            None
        }
    };
    let _ = shutdown_tx.send(true);

    let server_result = match server_result {
        Some(result) => result,
        None => server.await,
    };
    let _ = regen_task.await;
    server_result??;

    tracing::info!("Prisma Server stopped");
    Ok(())
}
