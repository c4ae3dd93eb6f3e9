//! Logging initialization from [`LoggerConfig`].

use crate::config::LoggerConfig;
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level, matching the
/// usual tracing-subscriber behavior. Unknown format/output values fall
/// back to text on stderr.
pub fn init(cfg: &LoggerConfig) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.level.clone()));

    let json = cfg.format.eq_ignore_ascii_case("json");

    match cfg.output.as_str() {
        "stdout" => {
            if json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .with_writer(io::stdout)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(io::stdout)
                    .init();
            }
        }
        "stderr" => {
            if json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .with_writer(io::stderr)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(io::stderr)
                    .init();
            }
        }
        path => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let writer = Arc::new(file);
            if json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(writer)
                    .init();
            }
        }
    }
    Ok(())
}
