//! Configuration for the image data server.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sids_core::{ProducerConfig, ServerConfig, SlotConfig, WaitStrategy};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerFileConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Frame slot tuning.
    pub slot: SlotSection,
    /// Where frames come from.
    pub source: SourceConfig,
    /// Color filter parameters (`source.kind = "color-filter"`).
    pub filter: FilterConfig,
    /// Blob detector parameters (`source.kind = "blob"`).
    pub blob: BlobConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface to bind.
    pub bind_address: String,
    /// TCP port to accept clients on.
    pub port: u16,
    /// Bytes taken by one request read.
    pub recv_buffer: usize,
    /// Milliseconds to wait for open sessions at shutdown.
    pub shutdown_grace_ms: u64,
}

/// Reader wait strategy as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    Spin,
    Notify,
}

/// Frame slot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotSection {
    /// How sessions wait for a write in progress.
    pub wait: WaitMode,
    /// Re-check interval for `notify` waits, in milliseconds.
    pub poll_interval_ms: u64,
    /// Give up a frame read after this many milliseconds. 0 waits forever.
    pub max_wait_ms: u64,
    /// Hold off the producer while a session waits on the slot.
    pub yield_to_readers: bool,
}

/// Kind of frame source driving the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Generated moving gradient.
    Pattern,
    /// Threshold filter over an upstream RGB server.
    ColorFilter,
    /// Blob detector over an upstream grey server.
    Blob,
}

/// Frame source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Pattern width in pixels.
    pub width: u32,
    /// Pattern height in pixels.
    pub height: u32,
    /// Pattern in interleaved RGB rather than grey.
    pub color: bool,
    /// Frame rate cap. 0 runs as fast as the source allows.
    pub fps: u32,
    /// Upstream server (`host:port`) for filter and blob sources.
    pub upstream: String,
    /// Upstream connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Stop the server when the source fails instead of serving its last
    /// frame.
    pub stop_on_error: bool,
}

/// Thresholds for one channel filter: a pixel passes when the filtered
/// channel is above `above` and the two others are below their limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelThresholds {
    pub above: u8,
    pub below_first: u8,
    pub below_second: u8,
}

/// Color filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Red filter: R above, G and B below.
    pub red: ChannelThresholds,
    /// Green filter: G above, R and B below.
    pub green: ChannelThresholds,
    /// Blue filter: B above, R and G below.
    pub blue: ChannelThresholds,
    /// Percent weights of the red, green and blue filter outputs.
    pub weights: [u32; 3],
    /// Constant added to every output pixel.
    pub offset: u32,
}

/// Blob detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Pixels strictly above this value belong to the blob.
    pub threshold: u8,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 50000,
            recv_buffer: 100,
            shutdown_grace_ms: 500,
        }
    }
}

impl Default for SlotSection {
    fn default() -> Self {
        Self {
            wait: WaitMode::Notify,
            poll_interval_ms: 10,
            max_wait_ms: 0,
            yield_to_readers: true,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Pattern,
            width: 320,
            height: 240,
            color: true,
            fps: 30,
            upstream: "127.0.0.1:50001".into(),
            connect_timeout_ms: 5000,
            stop_on_error: true,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            red: ChannelThresholds {
                above: 162,
                below_first: 143,
                below_second: 255,
            },
            green: ChannelThresholds {
                above: 140,
                below_first: 126,
                below_second: 209,
            },
            blue: ChannelThresholds {
                above: 149,
                below_first: 87,
                below_second: 255,
            },
            weights: [100, 100, 100],
            offset: 0,
        }
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self { threshold: 128 }
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

impl ServerFileConfig {
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

    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_address: self.network.bind_address.clone(),
            port: self.network.port,
            recv_buffer: self.network.recv_buffer.max(1),
            shutdown_grace: Duration::from_millis(self.network.shutdown_grace_ms),
            ..ServerConfig::default()
        }
    }

    pub fn to_slot_config(&self) -> SlotConfig {
        SlotConfig {
            wait: match self.slot.wait {
                WaitMode::Spin => WaitStrategy::Spin,
                WaitMode::Notify => WaitStrategy::Notify,
            },
            poll_interval: Duration::from_millis(self.slot.poll_interval_ms.max(1)),
            max_wait: (self.slot.max_wait_ms > 0).then(|| Duration::from_millis(self.slot.max_wait_ms)),
        }
    }

    pub fn to_producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            target_fps: (self.source.fps > 0).then_some(self.source.fps),
            yield_to_readers: self.slot.yield_to_readers,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.source.connect_timeout_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ServerFileConfig::default()).unwrap();
        assert!(text.contains("port"));
        assert!(text.contains("kind = \"pattern\""));
        assert!(text.contains("wait = \"notify\""));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ServerFileConfig::default()).unwrap();
        let parsed: ServerFileConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 50000);
        assert_eq!(parsed.filter.red.above, 162);
        assert_eq!(parsed.blob.threshold, 128);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: ServerFileConfig = toml::from_str(
            r#"
            [source]
            kind = "color-filter"
            upstream = "camera:6000"

            [slot]
            wait = "spin"
            max_wait_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(parsed.source.kind, SourceKind::ColorFilter);
        assert_eq!(parsed.source.upstream, "camera:6000");
        assert_eq!(parsed.network.port, 50000);

        let slot = parsed.to_slot_config();
        assert_eq!(slot.wait, WaitStrategy::Spin);
        assert_eq!(slot.max_wait, Some(Duration::from_millis(250)));
    }

    #[test]
    fn zero_means_unbounded() {
        let mut cfg = ServerFileConfig::default();
        cfg.source.fps = 0;
        cfg.network.recv_buffer = 0;
        assert_eq!(cfg.to_producer_config().target_fps, None);
        assert_eq!(cfg.to_slot_config().max_wait, None);
        assert_eq!(cfg.to_server_config().recv_buffer, 1);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ServerFileConfig::load(Path::new("/nonexistent/sids-server.toml"));
        assert_eq!(cfg.source.kind, SourceKind::Pattern);
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("sids-server-{}-{name}.toml", std::process::id()))
    }

    #[test]
    fn written_default_reads_back() {
        let path = temp_path("default");
        ServerFileConfig::write_default(&path).unwrap();
        let cfg = ServerFileConfig::read(&path).unwrap().unwrap();
        assert_eq!(cfg.logging.level, "info");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_separates_missing_from_invalid() {
        assert!(ServerFileConfig::read(Path::new("/nonexistent/sids-server.toml")).unwrap().is_none());

        let path = temp_path("invalid");
        std::fs::write(&path, "[logging\nlevel = ").unwrap();
        assert!(ServerFileConfig::read(&path).is_err());
        assert_eq!(ServerFileConfig::log_level(&path), None);
        assert_eq!(ServerFileConfig::load(&path).logging.level, "info");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn log_level_comes_from_file() {
        let path = temp_path("level");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(ServerFileConfig::log_level(&path).as_deref(), Some("debug"));
        std::fs::remove_file(&path).unwrap();
    }
}
