//! Structured logging for the FunGame client.
//!
//! Provides span-based, filterable logging via the `tracing` ecosystem:
//! console output with timestamps and module paths, plus JSON file logging in
//! debug builds for post-mortem analysis of connection problems.

use fungame_config::Config;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "info,tungstenite=warn,tokio_tungstenite=warn,ureq=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "fungame.log";

/// Initialize the tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - whether file logging may be enabled
/// * `config` - optional configuration whose `debug.log_level` is used as the
///   base filter
///
/// `RUST_LOG` always takes precedence. Calling this twice is harmless; the
/// second call keeps the first subscriber.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_directive(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let file_wanted = debug_build && config.is_none_or(|c| c.debug.log_to_file);

    if file_wanted
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        let _ = subscriber.with(file_layer).try_init();
        return;
    }

    let _ = subscriber.try_init();
}

/// Filter directive derived from the config, falling back to [`DEFAULT_FILTER`].
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => {
            format!(
                "{},tungstenite=warn,tokio_tungstenite=warn,ureq=warn",
                config.debug.log_level
            )
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter_str = format!("{}", default_env_filter());
        assert!(filter_str.contains("tungstenite=warn"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_config_level_becomes_base_filter() {
        let mut config = Config::default();
        config.debug.log_level = "debug".to_string();
        let directive = filter_directive(Some(&config));
        assert!(directive.starts_with("debug,"));
        assert!(directive.contains("ureq=warn"));
    }

    #[test]
    fn test_empty_config_level_uses_default() {
        let mut config = Config::default();
        config.debug.log_level.clear();
        assert_eq!(filter_directive(Some(&config)), DEFAULT_FILTER);
        assert_eq!(filter_directive(None), DEFAULT_FILTER);
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,fungame_client=trace",
            "warn,fungame_net=debug,fungame_client=debug",
            "error",
        ];

        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "Failed to parse filter: {}", filter_str);
        }
    }

    #[test]
    fn test_file_logger_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_file_path = temp_dir.path().join(LOG_FILE_NAME);
        assert_eq!(log_file_path.file_name().unwrap(), "fungame.log");
    }
}
