//! Global `tracing` subscriber for the gateway binary.
//!
//! The `debug` flags of the key manager and the middleware only gate which
//! diagnostic events get emitted. Those events are `debug!` records under
//! this crate's target, so turning either flag on also lowers the filter
//! for `signature_auth` regardless of the configured level.

use crate::config::ServiceConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const CRATE_DEBUG_DIRECTIVE: &str = "signature_auth=debug";

/// Filter directives derived from the service config.
pub fn filter_directives(config: &ServiceConfig) -> String {
    if config.key_manager.debug || config.auth.debug {
        format!("{},{}", config.log_level, CRATE_DEBUG_DIRECTIVE)
    } else {
        config.log_level.clone()
    }
}

fn build_filter(config: &ServiceConfig) -> EnvFilter {
    // RUST_LOG wins over the config file
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(config)))
}

fn file_appender(config: &ServiceConfig) -> RollingFileAppender {
    let (dir, file) = (&config.log_dir, &config.log_file);
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(dir, file),
        "daily" => tracing_appender::rolling::daily(dir, file),
        _ => tracing_appender::rolling::never(dir, file),
    }
}

/// Install the global subscriber. Keep the guard alive for the process
/// lifetime or buffered file output is lost.
pub fn init_logging(config: &ServiceConfig) -> WorkerGuard {
    let (writer, guard): (NonBlocking, WorkerGuard) =
        tracing_appender::non_blocking(file_appender(config));
    let registry = tracing_subscriber::registry().with(build_filter(config));

    if config.use_json {
        // JSON keeps the target so diagnostics can be filtered downstream
        registry
            .with(fmt::layer().json().with_target(true).with_writer(writer).with_ansi(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(writer).with_ansi(false))
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    guard
}
