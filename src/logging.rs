use std::path::PathBuf;

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

const DEFAULT_TARGET: &str = "sgl_tool_parser";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the parser targets (default: INFO)
    pub level: Level,
    /// Emit one JSON object per event (default: false)
    pub json_format: bool,
    /// Directory for daily rolling log files; stdout only when None
    pub log_dir: Option<String>,
    /// Colorize terminal output (default: true)
    pub colorize: bool,
    /// File name prefix inside `log_dir` (default: "sgl-tool-parser")
    pub log_file_name: String,
    /// Targets the level applies to (default: "sgl_tool_parser")
    pub log_targets: Option<Vec<String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "sgl-tool-parser".to_string(),
            log_targets: Some(vec![DEFAULT_TARGET.to_string()]),
        }
    }
}

impl LoggingConfig {
    /// `target=level` directives used when `RUST_LOG` is not set
    pub fn filter_directives(&self) -> String {
        let level = level_name(self.level);
        match &self.log_targets {
            Some(targets) if !targets.is_empty() => targets
                .iter()
                .map(|target| format!("{}={}", target, level))
                .collect::<Vec<_>>()
                .join(","),
            _ => format!("{}={}", DEFAULT_TARGET, level),
        }
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Keeps the file appender worker alive; drop it only at shutdown
#[allow(dead_code)]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once: later calls leave the first subscriber in
/// place. `log` records from dependencies are bridged into tracing.
pub fn init_logging(config: LoggingConfig) -> LogGuard {
    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()));
    let stdout_layer = if config.json_format {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    };

    let mut layers = vec![stdout_layer];
    let mut file_guard = None;

    if let Some(log_dir) = &config.log_dir {
        let log_dir = PathBuf::from(log_dir);
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create log directory {}: {}", log_dir.display(), e);
            return LogGuard { _file_guard: None };
        }

        let appender =
            RollingFileAppender::new(Rotation::DAILY, log_dir, config.log_file_name.clone());
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
            .with_writer(writer);
        let file_layer = if config.json_format {
            file_layer.json().flatten_event(true).boxed()
        } else {
            file_layer.boxed()
        };
        layers.push(file_layer);
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}
