//! Configuration for the display server.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use inkcast_core::{CastError, DisplayGeometry};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Target display panel.
    pub display: DisplayConfig,
    /// Streaming behavior.
    pub stream: StreamConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind the client listener to.
    pub bind_addr: String,
    /// TCP port display clients connect to.
    pub port: u16,
}

/// Display panel dimensions and tile partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Panel width in pixels (must pack into whole bytes).
    pub width: u32,
    /// Panel height in pixels.
    pub height: u32,
    /// Tile band height in rows (must divide the panel height).
    pub tile_height: u32,
}

/// Streaming behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Seconds to wait for a client readiness signal after each tile.
    pub ready_timeout_secs: u64,
    /// Broadcast a built-in test pattern when a client connects.
    pub pattern_on_connect: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            display: DisplayConfig::default(),
            stream: StreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8266,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        // GDEQ0426T82-class panel: 800×480, three 160-row bands.
        Self {
            width: 800,
            height: 480,
            tile_height: 160,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 30,
            pattern_on_connect: false,
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

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Validate the display section into a geometry.
    pub fn geometry(&self) -> Result<DisplayGeometry, CastError> {
        DisplayGeometry::new(
            self.display.width,
            self.display.height,
            self.display.tile_height,
        )
    }

    /// The per-tile readiness deadline.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.stream.ready_timeout_secs)
    }

    /// The listener's bind address.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind_addr, self.network.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────
