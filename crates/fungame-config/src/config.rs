//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_NAME: &str = "fungame";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Game server endpoints.
    pub server: ServerConfig,
    /// Game directory (lobby) behaviour.
    pub lobby: LobbyConfig,
    /// Real-time transport settings.
    pub transport: TransportConfig,
    /// Stored-session settings.
    pub session: SessionConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Game server endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the REST API (without the `/api` suffix).
    pub base_url: String,
    /// WebSocket URL of the real-time channel.
    pub socket_url: String,
    /// `host:port` of the framed-TCP fallback channel.
    pub tcp_address: String,
}

/// Lobby settings used when the client has to create a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LobbyConfig {
    /// Name given to games created by this client.
    pub default_game_name: String,
    /// Player cap for games created by this client.
    pub default_max_players: u32,
    /// Timeout for a single REST call, in seconds.
    pub request_timeout_seconds: u64,
}

/// A real-time transport encoding, in preference order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportPreference {
    /// JSON text messages over a WebSocket.
    WebSocket,
    /// Length-prefixed JSON frames over plain TCP.
    Tcp,
}

/// Real-time transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Encodings to try, first match wins.
    pub transports: Vec<TransportPreference>,
    /// Per-encoding connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Initial reconnect delay in milliseconds.
    pub reconnect_initial_delay_ms: u64,
    /// Upper bound on the reconnect delay in milliseconds.
    pub reconnect_max_delay_ms: u64,
    /// Reconnect attempts before giving up.
    pub reconnect_max_attempts: u32,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 - 1.0).
    pub jitter: f64,
    /// Keepalive interval in seconds.
    pub keepalive_seconds: u64,
    /// Largest accepted frame payload in bytes.
    pub max_frame_bytes: u32,
}

/// Stored-session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Profile name; each profile keeps its own stored session.
    pub profile: String,
    /// Directory holding session files. `None` uses the OS data directory.
    pub directory: Option<PathBuf>,
    /// Keep the session in memory only.
    pub in_memory: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write JSON logs to the log directory in debug builds.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            socket_url: "ws://127.0.0.1:5000/ws".to_string(),
            tcp_address: "127.0.0.1:5001".to_string(),
        }
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            default_game_name: "New Game".to_string(),
            default_max_players: 4,
            request_timeout_seconds: 10,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transports: vec![TransportPreference::WebSocket, TransportPreference::Tcp],
            connect_timeout_ms: 5_000,
            reconnect_initial_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            reconnect_max_attempts: 20,
            backoff_multiplier: 2.0,
            jitter: 0.25,
            keepalive_seconds: 5,
            max_frame_bytes: 1_048_576,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            directory: None,
            in_memory: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
        }
    }
}

impl SessionConfig {
    /// Directory holding session files, falling back to the OS data directory.
    ///
    /// Returns `None` when neither is available; callers treat that as
    /// "storage unavailable".
    pub fn resolve_directory(&self) -> Option<PathBuf> {
        self.directory
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_NAME).join("sessions")))
    }
}

// --- Validation ---

impl TransportConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if self.transports.is_empty() {
            return invalid("transport.transports", "at least one transport is required");
        }
        if self.connect_timeout_ms == 0 {
            return invalid("transport.connect_timeout_ms", "must be greater than zero");
        }
        if self.keepalive_seconds == 0 {
            return invalid("transport.keepalive_seconds", "must be greater than zero");
        }
        if self.max_frame_bytes == 0 {
            return invalid("transport.max_frame_bytes", "must be greater than zero");
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return invalid("transport.backoff_multiplier", "must be a finite number >= 1.0");
        }
        if !self.jitter.is_finite() || !(0.0..=1.0).contains(&self.jitter) {
            return invalid("transport.jitter", "must be within 0.0..=1.0");
        }
        if self.reconnect_initial_delay_ms > self.reconnect_max_delay_ms {
            return invalid(
                "transport.reconnect_initial_delay_ms",
                "must not exceed reconnect_max_delay_ms",
            );
        }
        Ok(())
    }
}

impl Config {
    /// Check the values the transport and lobby cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lobby.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "lobby.request_timeout_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.lobby.default_max_players == 0 {
            return Err(ConfigError::Invalid {
                field: "lobby.default_max_players",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.transport.validate()
    }
}

// --- Load / Save ---

impl Config {
    /// Default OS-specific directory holding `config.ron`.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("default_max_players: 4"));
        assert!(ron_str.contains("base_url: \"http://127.0.0.1:5000\""));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(server: (), lobby: (default_max_players: 6))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.transport, TransportConfig::default());
        assert_eq!(config.lobby.default_max_players, 6);
        assert_eq!(config.lobby.default_game_name, "New Game");
    }

    #[test]
    fn test_transport_order_parses() {
        let ron_str = "(transport: (transports: [Tcp]))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.transport.transports, vec![TransportPreference::Tcp]);
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.base_url = "http://10.0.0.1:8080".to_string();
        config.session.profile = "second-tab".to_string();

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_keepalive_rejected() {
        let mut config = Config::default();
        config.transport.keepalive_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "transport.keepalive_seconds",
                ..
            })
        ));
    }

    #[test]
    fn test_unusable_backoff_multiplier_rejected() {
        for multiplier in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            let mut config = Config::default();
            config.transport.backoff_multiplier = multiplier;
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::Invalid {
                        field: "transport.backoff_multiplier",
                        ..
                    })
                ),
                "multiplier {multiplier} accepted"
            );
        }
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.ron"),
            "(transport: (keepalive_seconds: 0))",
        )
        .unwrap();
        assert!(matches!(
            Config::load_or_create(dir.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_session_directory_wins() {
        let session = SessionConfig {
            directory: Some(PathBuf::from("/tmp/fungame-sessions")),
            ..Default::default()
        };
        assert_eq!(
            session.resolve_directory(),
            Some(PathBuf::from("/tmp/fungame-sessions"))
        );
    }
}
