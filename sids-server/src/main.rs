//! sids-server: entry point.
//!
//! ```text
//! sids-server                          Run with sids-server.toml or defaults
//! sids-server --config <path>          Load a custom config TOML
//! sids-server --port 50000             Override the listening port
//! sids-server --source blob --upstream host:port
//! sids-server --gen-config             Write default config to stdout
//! sids-server --init-config            Write default config to the --config path
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sids_server::config::{ServerFileConfig, SourceKind};
use sids_server::service::ImageDataService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sids-server", about = "Standard image data server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "sids-server.toml")]
    config: PathBuf,

    /// Port of this server (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Frame source (overrides the config file).
    #[arg(long, value_parser = parse_source)]
    source: Option<SourceKind>,

    /// Upstream server `host:port` for filter and blob sources.
    #[arg(long)]
    upstream: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to the `--config` path and exit.
    #[arg(long)]
    init_config: bool,
}

fn parse_source(s: &str) -> Result<SourceKind, String> {
    match s {
        "pattern" => Ok(SourceKind::Pattern),
        "color-filter" => Ok(SourceKind::ColorFilter),
        "blob" => Ok(SourceKind::Blob),
        other => Err(format!("unknown source {other:?}; use pattern, color-filter or blob")),
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerFileConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    if cli.init_config {
        ServerFileConfig::write_default(&cli.config)?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }

    // Init tracing before loading, so a config fallback is reported.
    let level = ServerFileConfig::log_level(&cli.config).unwrap_or_else(|| "info".into());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ServerFileConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(kind) = cli.source {
        config.source.kind = kind;
    }
    if let Some(upstream) = cli.upstream {
        config.source.upstream = upstream;
    }

    info!("sids-server v{}", env!("CARGO_PKG_VERSION"));
    info!("port: {}", config.network.port);
    info!("source: {:?}", config.source.kind);

    let service = match ImageDataService::bind(config).await {
        Ok(svc) => svc,
        Err(e) => {
            error!("{e}; terminate process");
            std::process::exit(1);
        }
    };
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    if let Err(e) = service.run().await {
        error!("{e}; terminate process");
        std::process::exit(1);
    }
    Ok(())
}
