//! `fungame`: headless FunGame client.
//!
//! Connects to the configured server, rejoins the stored player when one
//! exists, and reads commands from stdin (`help` lists them).
//!
//! Run with: `cargo run -p fungame-cli -- --profile alice`

mod command;
mod shell;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fungame_client::{
    FileSessionStore, GameClient, HttpDirectory, InvalidProfile, LobbySettings, MemorySessionStore,
    SessionStore,
};
use fungame_config::{CliArgs, Config, ConfigError, SessionConfig, TransportPreference};
use fungame_net::{FrameConfig, ReconnectConfig, TransportClient, TransportConfig, TransportKind};
use tracing::{error, info, warn};

use crate::shell::Shell;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().or_else(|| Config::default_dir().ok());
    let (mut config, config_error) = load_config(config_dir.as_deref());
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.as_ref().map(|dir| dir.join("logs"));
    fungame_log::init_logging(log_dir.as_deref(), cfg!(debug_assertions), Some(&config));

    if let Some(err) = config_error {
        warn!("using default config: {err}");
    }

    info!("FunGame client");
    info!(
        "Server: {} | Socket: {} | TCP: {}",
        config.server.base_url, config.server.socket_url, config.server.tcp_address
    );

    let directory = Arc::new(HttpDirectory::new(
        &config.server.base_url,
        Duration::from_secs(config.lobby.request_timeout_seconds),
    ));
    let store = match session_store(&config.session) {
        Ok(store) => store,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let lobby = LobbySettings {
        game_name: config.lobby.default_game_name.clone(),
        max_players: config.lobby.default_max_players,
    };

    let (transport, events) = match TransportClient::spawn(transport_config(&config)) {
        Ok(spawned) => spawned,
        Err(e) => {
            error!("cannot start transport: {e}");
            return ExitCode::FAILURE;
        }
    };
    let (client, handle) = GameClient::new(
        Arc::new(transport),
        events,
        directory.clone(),
        Box::new(Arc::clone(&store)),
        lobby,
    );
    let driver = tokio::spawn(client.run());

    Shell::new(handle, directory, store).run().await;

    if let Err(e) = driver.await {
        warn!("client task failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn load_config(dir: Option<&Path>) -> (Config, Option<ConfigError>) {
    match dir.map(Config::load_or_create) {
        Some(Ok(config)) => (config, None),
        Some(Err(err)) => (Config::default(), Some(err)),
        None => (Config::default(), Some(ConfigError::NoConfigDir)),
    }
}

fn session_store(config: &SessionConfig) -> Result<Arc<dyn SessionStore>, InvalidProfile> {
    if config.in_memory {
        return Ok(Arc::new(MemorySessionStore::new()));
    }
    match config.resolve_directory() {
        Some(dir) => {
            let store = FileSessionStore::new(&dir, &config.profile)?;
            info!("Session file: {}", store.path().display());
            Ok(Arc::new(store))
        }
        None => {
            warn!("no data directory available; the session will not survive a restart");
            Ok(Arc::new(MemorySessionStore::new()))
        }
    }
}

fn transport_config(config: &Config) -> TransportConfig {
    let settings = &config.transport;
    let mut transport =
        TransportConfig::new(&config.server.socket_url, &config.server.tcp_address);

    transport.order = settings
        .transports
        .iter()
        .map(|preference| match preference {
            TransportPreference::WebSocket => TransportKind::WebSocket,
            TransportPreference::Tcp => TransportKind::FramedTcp,
        })
        .collect();
    transport.connect_timeout = Duration::from_millis(settings.connect_timeout_ms);
    transport.keepalive = Duration::from_secs(settings.keepalive_seconds);
    transport.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(settings.reconnect_initial_delay_ms),
        backoff_multiplier: settings.backoff_multiplier,
        max_delay: Duration::from_millis(settings.reconnect_max_delay_ms),
        max_attempts: settings.reconnect_max_attempts,
        jitter: settings.jitter,
    };
    transport.frame = FrameConfig {
        max_payload_size: settings.max_frame_bytes,
    };
    transport
}
