use color_eyre::eyre::Result;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use super::{LogConfig, LOG_FILENAME};

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("binders_repository={level}")))
}

/// Initialize the logging system with the given configuration.
pub fn init_logging(config: LogConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)?;
    let file_appender = RollingFileAppender::new(config.rotation, &config.log_dir, LOG_FILENAME);

    if config.json_format {
        let json_file_layer = fmt::layer()
            .json()
            .with_writer(file_appender)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_filter(env_filter(config.log_level));
        let json_console_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_target(true)
            .with_filter(env_filter(config.log_level));
        tracing_subscriber::registry()
            .with(json_file_layer)
            .with(json_console_layer)
            .with(ErrorLayer::default())
            .try_init()?;
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_ansi(false)
            .with_filter(env_filter(config.log_level));
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
            .with_filter(env_filter(config.log_level));
        tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer)
            .with(ErrorLayer::default())
            .try_init()?;
    }

    Ok(())
}

/// Parse rotation period from string.
#[must_use]
pub fn parse_rotation(s: &str) -> Rotation {
    match s.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

/// Parse a log level name, falling back to `INFO`.
#[must_use]
pub fn parse_level(s: &str) -> Level {
    s.parse().unwrap_or(Level::INFO)
}
