//! Logging setup shared by the watcher binary and its tests.
//!
//! Console output is human readable. The log file rolls over daily, keeps a
//! bounded number of old files and can be written as JSON lines.

use anyhow::{Context, Result};
use tracing::{Level, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: String,
    /// Log file prefix and default filter target
    pub component: String,
    pub default_level: Level,
    pub console: bool,
    pub file: bool,
    /// JSON lines instead of plain text in the log file
    pub json_format: bool,
    /// Rotated files kept next to the current one
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "appdata/logs".to_string(),
            component: "download-watcher".to_string(),
            default_level: Level::INFO,
            console: true,
            file: true,
            json_format: false,
            max_log_files: 14,
        }
    }
}

impl LogConfig {
    /// Take everything from the `[logging]` section of the config
    pub fn from_config(config: &crate::Config, component: &str) -> Result<Self> {
        Ok(Self {
            log_dir: config.log_dir().to_string_lossy().to_string(),
            component: component.to_string(),
            default_level: parse_level(&config.logging.default_level)?,
            console: config.logging.console,
            file: config.logging.file,
            json_format: config.logging.json_format,
            max_log_files: config.logging.max_log_files,
        })
    }

    /// Directive used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> String {
        format!(
            "warn,{}={level},shared={level}",
            target_name(&self.component),
            level = self.default_level
        )
    }
}

pub fn parse_level(value: &str) -> Result<Level> {
    value
        .trim()
        .parse::<Level>()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {}", value))
}

/// Crate names use underscores in targets
fn target_name(component: &str) -> String {
    component.replace('-', "_")
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a
/// subscriber is already installed.
pub fn init(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let mut layers = Vec::new();
    if config.console {
        layers.push(console_layer());
    }
    if config.file {
        layers.push(file_layer(&config)?);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        component = %config.component,
        log_dir = %config.log_dir,
        file = config.file,
        "Logging initialized"
    );
    Ok(())
}

fn console_layer<S>() -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_writer(std::io::stdout)
        .boxed()
}

fn file_layer<S>(config: &LogConfig) -> Result<BoxedLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {}", config.log_dir))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.component.clone())
        .filename_suffix("log")
        .max_log_files(config.max_log_files.max(1))
        .build(&config.log_dir)
        .with_context(|| format!("Failed to open log file in {}", config.log_dir))?;

    let layer = fmt::layer().with_target(true).with_ansi(false);
    Ok(if config.json_format {
        layer
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(appender)
            .boxed()
    } else {
        layer
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(appender)
            .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.component, "download-watcher");
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.console && config.file);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level(" WARN ").unwrap(), Level::WARN);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_from_config() {
        let mut config = crate::Config::default();
        config.logging.default_level = "trace".to_string();
        config.logging.file = false;

        let log_config = LogConfig::from_config(&config, "download-watcher").unwrap();
        assert_eq!(log_config.default_level, Level::TRACE);
        assert!(!log_config.file);
        assert!(log_config.log_dir.ends_with("logs"));
    }

    #[test]
    fn test_default_directive_uses_crate_target() {
        let config = LogConfig {
            default_level: Level::DEBUG,
            ..Default::default()
        };
        assert_eq!(
            config.default_directive(),
            "warn,download_watcher=DEBUG,shared=DEBUG"
        );
    }
}
