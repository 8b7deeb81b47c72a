use clap::Parser;
use immich_resize_proxy::config::Config;
use immich_resize_proxy::server::{build_server, ServerFlags};
use std::path::PathBuf;

/// Immich Resize Proxy - downsizes and transcodes photo uploads before they reach Immich
#[derive(Parser, Debug)]
#[command(name = "immich-resize-proxy")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (environment variables are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn main() {
    if let Err(e) = immich_resize_proxy::logging::init_subscriber() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    };
    let config = loaded.unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    tracing::info!(
        config_file = %args
            .config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<environment>".to_string()),
        backend_url = %config.backend.url,
        max_width = config.image.max_width,
        max_height = config.image.max_height,
        quality = config.image.quality,
        "Configuration loaded successfully"
    );

    let flags = ServerFlags {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
    };

    let server = build_server(config, flags).unwrap_or_else(|e| {
        eprintln!("Failed to start server: {}", e);
        std::process::exit(1);
    });

    tracing::info!("Starting Immich Resize Proxy");
    server.run_forever();
}
