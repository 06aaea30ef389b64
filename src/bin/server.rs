use std::net::SocketAddr;

use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;

use pocket_ledger::{
    AppState, CurrencyCode, LedgerConfig, Timestamp, add_tracing_layer, build_router,
    graceful_shutdown, setup_logging,
};

/// The JSON API server for pocket_ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of your time zone, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// The currency used when a transaction does not name one.
    #[arg(long, default_value = "USD")]
    currency: CurrencyCode,

    /// How many occurrences to create when a recurring rule is added.
    #[arg(long, default_value_t = 12)]
    lookahead: u32,
}

#[tokio::main]
async fn main() {
    setup_logging().expect("Could not set up logging");

    let args = Args::parse();

    let config = LedgerConfig {
        local_timezone: args.timezone,
        default_currency: args.currency,
        lookahead_count: args.lookahead,
    };

    let connection = Connection::open(&args.db_path).expect("Could not open database");
    let state = AppState::new(connection, &config).expect("Could not create app state");

    let report = state
        .catch_up
        .run(Timestamp::now())
        .expect("Could not process recurring transactions");
    for failure in &report.failures {
        tracing::warn!(
            "Recurring rule {} was not processed: {}",
            failure.rule_id,
            failure.reason
        );
    }

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .unwrap();
}
