//! Logging configuration and initialization
//!
//! Structured logging with tracing, supporting console output, file logging
//! and JSON format for production.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing::Subscriber;
use tracing_subscriber::{filter::EnvFilter, fmt, fmt::MakeWriter, prelude::*, registry::LookupSpan, Layer};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable console output (default: true)
    pub console_enabled: bool,
    /// Write logs to this file instead of the console when set
    pub file_path: Option<PathBuf>,
    /// Use JSON format for the active output (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Whether JSON output is requested by config or `PRISMA_LOG_FORMAT`
    pub fn wants_json(&self, format_var: Option<&str>) -> bool {
        format_var
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }
}

/// Initialize the logging system with the given configuration
///
/// Returns a guard that must be kept alive for the duration of the program
/// so file logging is flushed. The JSON choice applies to whichever output
/// is active, file or console.
///
/// # Environment Variables
///
/// - `PRISMA_LOG`: log level filter (e.g., "debug", "info,prisma_server=debug")
/// - `PRISMA_LOG_FORMAT`: set to "json" for JSON output
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    // PRISMA_LOG first, then RUST_LOG, then config default
    let env_filter = EnvFilter::try_from_env("PRISMA_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let format_var = std::env::var("PRISMA_LOG_FORMAT").ok();
    let use_json = config.wants_json(format_var.as_deref());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let mut file_guard: Option<WorkerGuard> = None;

    if let Some(log_path) = &config.file_path {
        let file = std::fs::File::create(log_path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let file_layer = output_layer(non_blocking, use_json, false);
        if config.console_enabled {
            let console_layer = output_layer(std::io::stdout, use_json, true);
            subscriber.with(file_layer).with(console_layer).try_init()?;
        } else {
            subscriber.with(file_layer).try_init()?;
        }

        eprintln!("Logging to file: {}", log_path.display());
    } else if config.console_enabled {
        subscriber.with(output_layer(std::io::stdout, use_json, true)).try_init()?;
    } else {
        subscriber.try_init()?;
    }

    tracing::info!(
        target: "prisma_server",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_path.is_some(),
        "Logging initialized"
    );

    Ok(file_guard)
}

/// Formatting layer writing to `writer`: one JSON object per line, or
/// compact text
fn output_layer<S, W>(writer: W, json: bool, ansi: bool) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(ansi)
            .compact()
            .boxed()
    }
}

pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(config.file_path.is_none());
        assert!(!config.json_format);
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_json_format_override() {
        let config = LogConfig::default();
        assert!(config.wants_json(Some("JSON")));
        assert!(!config.wants_json(Some("pretty")));
        assert!(!config.wants_json(None));

        let json = LogConfig { json_format: true, ..LogConfig::default() };
        assert!(json.wants_json(None));
    }

    /// In-memory writer for capturing formatted output
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(json: bool) -> String {
        let out = Captured::default();
        let subscriber = tracing_subscriber::registry().with(output_layer(out.clone(), json, false));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(frames = 3, "pipeline ready");
        });
        let bytes = out.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_json_layer_writes_json_lines() {
        let line = capture(true);
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["fields"]["message"], "pipeline ready");
        assert_eq!(value["fields"]["frames"], 3);
        assert_eq!(value["level"], "INFO");
    }

    #[test]
    fn test_text_layer_is_plain() {
        let line = capture(false);
        assert!(line.contains("pipeline ready"));
        assert!(serde_json::from_str::<serde_json::Value>(line.trim()).is_err());
        assert!(!line.contains('\u{1b}'));
    }
}
