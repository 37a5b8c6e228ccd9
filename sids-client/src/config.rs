//! Client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sids_core::ClientConfig;

/// Top-level configuration for the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientFileConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// What to do with received frames.
    pub view: ViewConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server address, `host:port`.
    pub server_address: String,
    /// Connection timeout in milliseconds.
    pub timeout_ms: u64,
    /// Largest accepted version or metadata reply.
    pub reply_buffer: usize,
    /// Reject metadata whose payload size disagrees with its geometry.
    pub strict_metadata: bool,
}

/// How frames are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Any stream; print frame statistics.
    Pixels,
    /// Blob detector stream; print coordinates.
    Blob,
}

/// Viewer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub mode: ViewMode,
    /// Stop after this many frames. 0 runs until interrupted.
    pub frames: u64,
    /// Pause between requests in milliseconds.
    pub interval_ms: u64,
    /// Print statistics every this many frames.
    pub report_every: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:50000".into(),
            timeout_ms: 5000,
            reply_buffer: 124,
            strict_metadata: false,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            mode: ViewMode::Pixels,
            frames: 0,
            interval_ms: 0,
            report_every: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientFileConfig {
    /// Read a TOML configuration file. `Ok(None)` when there is no file.
    pub fn read(path: &Path) -> Result<Option<Self>, toml::de::Error> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// The fallback is logged, so install the subscriber first.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Log level named by the file at `path`, if it parses.
    pub fn log_level(path: &Path) -> Option<String> {
        Self::read(path).ok().flatten().map(|c| c.logging.level)
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            reply_buffer: self.network.reply_buffer.max(1),
            connect_timeout: Duration::from_millis(self.network.timeout_ms),
            strict_metadata: self.network.strict_metadata,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
