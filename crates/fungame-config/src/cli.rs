//! Command-line argument parsing for the FunGame client.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// FunGame client command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "fungame", about = "Headless FunGame client")]
pub struct CliArgs {
    /// REST base URL, e.g. `http://127.0.0.1:5000`.
    #[arg(long)]
    pub server: Option<String>,

    /// WebSocket URL of the real-time channel.
    #[arg(long)]
    pub socket_url: Option<String>,

    /// `host:port` of the framed-TCP fallback channel.
    #[arg(long)]
    pub tcp_address: Option<String>,

    /// Session profile (one stored player per profile).
    #[arg(long)]
    pub profile: Option<String>,

    /// Keep the stored session in memory only.
    #[arg(long)]
    pub in_memory_session: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref url) = args.server {
            self.server.base_url = url.clone();
        }
        if let Some(ref url) = args.socket_url {
            self.server.socket_url = url.clone();
        }
        if let Some(ref addr) = args.tcp_address {
            self.server.tcp_address = addr.clone();
        }
        if let Some(ref profile) = args.profile {
            self.session.profile = profile.clone();
        }
        if args.in_memory_session {
            self.session.in_memory = true;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            server: Some("http://192.168.1.1:5000".to_string()),
            profile: Some("tab-2".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.server.base_url, "http://192.168.1.1:5000");
        assert_eq!(config.session.profile, "tab-2");
        // Non-overridden fields retain defaults
        assert_eq!(config.server.tcp_address, "127.0.0.1:5001");
        assert!(!config.session.in_memory);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "fungame",
            "--socket-url",
            "ws://example:9000/ws",
            "--in-memory-session",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.socket_url.as_deref(), Some("ws://example:9000/ws"));
        assert!(args.in_memory_session);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }
}
