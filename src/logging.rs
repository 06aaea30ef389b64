//! Sets up `tracing` for the server and its request logging.

use std::{fs::OpenOptions, io, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// The file that receives debug level logs.
pub const DEBUG_LOG_PATH: &str = "debug.log";

/// Log to stdout and to [DEBUG_LOG_PATH].
///
/// Stdout is filtered by the `RUST_LOG` environment variable and shows
/// `info` and above when it is unset. The file always receives `debug` and above.
///
/// # Errors
/// Returns an error if the log file cannot be opened.
pub fn setup_logging() -> Result<(), io::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(env_filter);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(DEBUG_LOG_PATH)?;

    let debug_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

/// Wrap `router` so that every request gets its own debug span.
pub fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            let method = request.method();
            let uri = request.uri();

            let matched_path = request
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are handled.
        .on_failure(());

    router.layer(tracing_layer)
}
