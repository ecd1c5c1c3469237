//! inkcast display server — entry point.
//!
//! ```text
//! inkcast-server                   Run with inkcast.toml (or defaults)
//! inkcast-server --config <path>   Load a custom config TOML
//! inkcast-server --gen-config      Write default config to stdout
//! inkcast-server --pattern         Send a test pattern to new clients
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use inkcast_server::config::ServerConfig;
use inkcast_server::server::DisplayServer;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "inkcast-server", about = "inkcast e-paper display server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "inkcast.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Broadcast a built-in test pattern when a client connects.
    #[arg(long)]
    pattern: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let mut config = ServerConfig::load(&cli.config);
    if cli.pattern {
        config.stream.pattern_on_connect = true;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("inkcast-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen: {}", config.listen_addr());
    info!(
        "display: {}x{} in {}-row bands",
        config.display.width, config.display.height, config.display.tile_height
    );
    info!("ready timeout: {}s", config.stream.ready_timeout_secs);

    let server = DisplayServer::new(config)?;
    let stop = server.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown requested");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    server.run().await?;
    Ok(())
}
