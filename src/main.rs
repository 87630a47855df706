//! # Wayfarer - minimal Wayland compositor core
//!
//! Binary entry point: CLI parsing, logging, configuration, and the exit
//! code contract — 0 on clean shutdown, 1 when the backend fails to
//! start. The default build runs against the headless reference backend
//! with one synthetic output and pointer.

use std::process::ExitCode;

use calloop::channel;
use clap::Parser;
use log::{error, info};

use wayfarer::backend::headless::HeadlessBackend;
use wayfarer::backend::{headless, Mode};
use wayfarer::compositor::{Compositor, StartError};
use wayfarer::config::Config;

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(about = "A minimal Wayland compositor core")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/wayfarer/wayfarer.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Override the socket name prefix from the config
    #[arg(long)]
    socket: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("🚀 Starting Wayfarer compositor core");
    info!("📄 Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match Config::load(&cli.config) {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            info!("📝 Using default configuration ({})", e);
            Config::default()
        }
    };
    if let Some(socket) = cli.socket {
        config.general.socket_prefix = socket;
    }

    // Collaborator wiring: one ordered event channel, headless reference
    // implementations behind the contracts.
    let (events_tx, events_rx) = channel::channel();
    let (mut collab, log) = headless::collaborators(events_tx.clone());
    collab.backend = Box::new(
        HeadlessBackend::new(events_tx, log)
            .with_vsync(config.frame_interval())
            .with_synthetic_output(vec![
                Mode { width: 1280, height: 720, refresh: 60_000 },
                Mode { width: 1920, height: 1080, refresh: 60_000 },
            ]),
    );

    // Fatal setup tier: no display or event loop means no compositor.
    let mut compositor = match Compositor::new(config, collab, events_rx) {
        Ok(compositor) => compositor,
        Err(e) => {
            error!("❌ failed to initialize compositor: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Recoverable tier: a backend that will not start releases what was
    // acquired and exits with status 1, never entering the dispatch loop.
    if let Err(e) = compositor.start() {
        match e {
            StartError::Backend(e) => {
                error!("❌ {}", e);
                return ExitCode::from(1);
            }
            StartError::Setup(e) => {
                error!("❌ startup failed: {:#}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    match compositor.run() {
        Ok(()) => {
            info!("👋 Wayfarer shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ compositor error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
