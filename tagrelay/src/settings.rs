//! Daemon settings

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rfid_protocol::TagProtocol;
use rfid_relay::{AggregationStrategy, EmptyMessagePolicy, RelayConfig};
use rfid_sim::VirtualReaderConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable naming an explicit settings file
pub const SETTINGS_ENV: &str = "TAGRELAY_SETTINGS";

/// Which interrogator implementation backs the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReaderBackend {
    /// Simulated reader
    Simulated(VirtualReaderConfig),
}

impl Default for ReaderBackend {
    fn default() -> Self {
        Self::Simulated(VirtualReaderConfig::default())
    }
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Antenna ports to read on
    pub antennas: Vec<u8>,
    /// Air protocol
    pub protocol: TagProtocol,
    /// Upper bound on each reader connect attempt
    pub connect_timeout_ms: u64,
    /// Length of each read window
    pub window_ms: u64,
    /// Pause between cycles
    pub inter_cycle_ms: u64,
    /// Tag collection strategy
    pub aggregation: AggregationStrategy,
    /// Serial bridge baud rate
    pub baud_rate: u32,
    /// Serial bridge port (first port other than the reader's if unset)
    pub serial_port: Option<String>,
    /// Delay before appending each identifier to a message
    pub item_pacing_ms: u64,
    /// Whether to write a message for windows without tags
    pub empty_message: EmptyMessagePolicy,
    /// Abort when no region can be configured
    pub require_region: bool,
    /// Log raw reader transport frames at trace level
    pub trace_transport: bool,
    /// Skip ports whose names contain any of these
    pub skip_patterns: Vec<String>,
    /// Interrogator implementation
    pub backend: ReaderBackend,
}

impl Default for Settings {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            antennas: relay.antennas,
            protocol: relay.protocol,
            connect_timeout_ms: relay.connect_timeout.as_millis() as u64,
            window_ms: relay.window.as_millis() as u64,
            inter_cycle_ms: relay.inter_cycle.as_millis() as u64,
            aggregation: relay.aggregation,
            baud_rate: relay.baud_rate,
            serial_port: relay.serial_port,
            item_pacing_ms: relay.item_pacing.as_millis() as u64,
            empty_message: relay.empty_message,
            require_region: relay.require_region,
            trace_transport: relay.trace_transport,
            skip_patterns: vec!["Bluetooth".to_string(), "debug".to_string()],
            backend: ReaderBackend::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    ///
    /// `$TAGRELAY_SETTINGS` wins, then `$XDG_CONFIG_HOME/tagrelay`, then
    /// `~/.config/tagrelay`.
    pub fn settings_path() -> Option<PathBuf> {
        resolve_path(
            std::env::var_os(SETTINGS_ENV),
            std::env::var_os("XDG_CONFIG_HOME"),
            dirs::home_dir(),
        )
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            warn!("Could not determine settings path, using defaults");
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    /// Relay configuration described by these settings
    pub fn to_relay_config(&self) -> RelayConfig {
        RelayConfig {
            antennas: self.antennas.clone(),
            protocol: self.protocol,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            window: Duration::from_millis(self.window_ms),
            inter_cycle: Duration::from_millis(self.inter_cycle_ms),
            aggregation: self.aggregation,
            baud_rate: self.baud_rate,
            serial_port: self.serial_port.clone(),
            item_pacing: Duration::from_millis(self.item_pacing_ms),
            empty_message: self.empty_message,
            require_region: self.require_region,
            trace_transport: self.trace_transport,
        }
    }
}

fn resolve_path(
    explicit: Option<OsString>,
    xdg_config: Option<OsString>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    // XDG requires an absolute path; anything else is ignored
    if let Some(xdg) = xdg_config.map(PathBuf::from).filter(|p| p.is_absolute()) {
        return Some(xdg.join("tagrelay").join("settings.json"));
    }

    home.map(|h| h.join(".config").join("tagrelay").join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_relay_defaults() {
        let config = Settings::default().to_relay_config();
        assert_eq!(config.antennas, vec![1, 2, 3, 4]);
        assert_eq!(config.protocol, TagProtocol::Gen2);
        assert_eq!(config.connect_timeout, Duration::from_millis(3000));
        assert_eq!(config.window, Duration::from_millis(500));
        assert_eq!(config.inter_cycle, Duration::from_millis(1000));
        assert_eq!(config.aggregation, AggregationStrategy::Polling);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.serial_port, None);
        assert_eq!(config.item_pacing, Duration::ZERO);
        assert_eq!(config.empty_message, EmptyMessagePolicy::Send);
        assert!(config.require_region);
        assert!(!config.trace_transport);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{ "aggregation": "listener", "empty_message": "skip", "window_ms": 250 }"#,
        )
        .unwrap();

        assert_eq!(settings.aggregation, AggregationStrategy::Listener);
        assert_eq!(settings.empty_message, EmptyMessagePolicy::Skip);
        assert_eq!(settings.window_ms, 250);
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.skip_patterns, vec!["Bluetooth", "debug"]);
    }

    #[test]
    fn test_backend_config() {
        let settings: Settings = serde_json::from_str(
            r#"{ "backend": { "kind": "simulated", "tags": ["E1"], "region": "Europe",
                 "supported_regions": ["Europe"], "port": "/dev/ttyACM0" } }"#,
        )
        .unwrap();

        let ReaderBackend::Simulated(config) = settings.backend;
        assert_eq!(config.tags, vec!["E1"]);
        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.emit_interval_ms, 100);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            serial_port: Some("/dev/ttyUSB1".to_string()),
            item_pacing_ms: 5,
            require_region: false,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.serial_port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(loaded.item_pacing_ms, 5);
        assert!(!loaded.require_region);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("settings.json"));
    }

    #[test]
    fn test_path_resolution() {
        let home = Some(PathBuf::from("/home/op"));

        assert_eq!(
            resolve_path(Some("/etc/tagrelay.json".into()), None, home.clone()),
            Some(PathBuf::from("/etc/tagrelay.json"))
        );
        assert_eq!(
            resolve_path(None, Some("/xdg".into()), home.clone()),
            Some(PathBuf::from("/xdg/tagrelay/settings.json"))
        );
        assert_eq!(
            resolve_path(None, Some("relative".into()), home.clone()),
            Some(PathBuf::from("/home/op/.config/tagrelay/settings.json"))
        );
        assert_eq!(resolve_path(None, None, None), None);
    }
}
