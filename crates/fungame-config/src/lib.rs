//! Configuration system for the FunGame client.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports CLI overrides via clap, value validation on load, and forward/backward
//! compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, LobbyConfig, ServerConfig, SessionConfig, TransportConfig,
    TransportPreference,
};
pub use error::ConfigError;
