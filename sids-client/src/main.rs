//! sids-client: entry point.
//!
//! ```text
//! sids-client                       Connect with defaults
//! sids-client --server host:port    Override the server address
//! sids-client --blob                Expect a blob detector stream
//! sids-client --config <path>       Use custom config TOML
//! sids-client --gen-config          Dump default config and exit
//! sids-client --init-config         Write default config to the --config path
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sids_core::{BlobClient, Client, SidsError};

use sids_client::config::{ClientFileConfig, ViewMode};
use sids_client::display::coordinate_line;
use sids_client::viewer::{view_blobs, view_pixels};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sids-client", about = "Standard image data client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "sids-client.toml")]
    config: PathBuf,

    /// Server address (overrides config). Example: 127.0.0.1:50000
    #[arg(short, long)]
    server: Option<String>,

    /// Treat the stream as blob detector output.
    #[arg(long)]
    blob: bool,

    /// Stop after this many frames.
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to the `--config` path and exit.
    #[arg(long)]
    init_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientFileConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    if cli.init_config {
        ClientFileConfig::write_default(&cli.config)?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }

    // Init tracing before loading, so a config fallback is reported.
    let level = ClientFileConfig::log_level(&cli.config).unwrap_or_else(|| "info".into());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ClientFileConfig::load(&cli.config);
    if let Some(addr) = cli.server {
        config.network.server_address = addr;
    }
    if cli.blob {
        config.view.mode = ViewMode::Blob;
    }
    if let Some(frames) = cli.frames {
        config.view.frames = frames;
    }

    info!("sids-client v{}", env!("CARGO_PKG_VERSION"));

    let running = Arc::new(AtomicBool::new(true));
    let stop = Arc::clone(&running);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    if let Err(e) = run(&config, &running).await {
        error!("{e}; terminate process");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(config: &ClientFileConfig, running: &AtomicBool) -> Result<(), SidsError> {
    let addr = &config.network.server_address;
    let client_config = config.to_client_config();

    match config.view.mode {
        ViewMode::Pixels => {
            let mut client = Client::connect(addr, &client_config).await?;
            let stats = view_pixels(&mut client, &config.view, running).await?;
            info!("done: {stats}");
        }
        ViewMode::Blob => {
            let mut client = BlobClient::connect(addr, &client_config).await?;
            let n = view_blobs(&mut client, &config.view, running, |c| {
                println!("{}", coordinate_line(&c));
            })
            .await?;
            info!("done: {n} coordinates received");
        }
    }
    Ok(())
}
