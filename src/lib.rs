//! Pocket Ledger is a single-user store for personal income and expenses.
//!
//! Besides ordinary transaction bookkeeping, the library materializes
//! recurring rules (rent, wages, subscriptions) into concrete transactions.
//! New rules pre-generate a look-ahead window of occurrences, and a catch-up
//! pass on every start fills in any occurrence that has fallen due since the
//! last run. Both are safe to repeat: the rule's due date is the single source
//! of truth for what has already been materialized.
//!
//! The library also provides a JSON API over the same operations so that a
//! separate UI can drive it.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod category;
mod config;
mod currency;
mod database_id;
mod db;
pub mod endpoints;
mod logging;
mod recurring;
mod routing;
mod summary;
mod timestamp;
mod timezone;
mod transaction;

pub use app_state::AppState;
pub use category::{
    Category, CategoryAppearance, CategoryName, create_category, delete_category, get_categories,
};
pub use config::{DEFAULT_LOOKAHEAD_COUNT, LedgerConfig};
pub use currency::CurrencyCode;
pub use database_id::{CategoryId, DatabaseId, RecurringRuleId, TransactionId};
pub use db::initialize as initialize_db;
pub use logging::{add_tracing_layer, setup_logging};
pub use recurring::{
    CatchUpReport, CatchUpRunner, CreatedRecurringRule, DueOccurrence, Frequency, LoadedRule,
    Lookahead, RECURRING_NOTE_PREFIX, RecurringRule, RecurringRuleDetails, RuleFailure, advance,
    create_recurring_rule, delete_recurring_rule, generate_lookahead, get_all_recurring_rules,
    get_recurring_rule, insert_recurring_rule, list_due_rules, materialize_next_occurrence,
    occurrences_due, update_rule_next_due_date,
};
pub use routing::build_router;
pub use summary::{
    DEFAULT_SUMMARY_MONTHS, MAX_SUMMARY_MONTHS, MonthlySummary, get_monthly_summaries,
};
pub use timestamp::Timestamp;
pub use timezone::Calendar;
pub use transaction::{
    Transaction, TransactionBuilder, TransactionFilter, TransactionKind, count_transactions,
    create_transaction, delete_transaction, get_transaction, get_transactions_in_range,
    update_transaction,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An amount was zero, negative or not a finite number.
    ///
    /// Amounts are always stored as positive values, whether money comes in
    /// or goes out is recorded by the transaction kind.
    #[error("{0} is not a valid amount, amounts must be positive numbers")]
    InvalidAmount(f64),

    /// A currency code was not a three letter ISO 4217 code.
    #[error("\"{0}\" is not a valid currency code")]
    InvalidCurrency(String),

    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// A category with the same name and kind already exists.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategory(String),

    /// A frequency given by the client is not one the engine knows about.
    #[error("\"{0}\" is not a valid frequency, expected \"weekly\" or \"monthly\"")]
    InvalidFrequency(String),

    /// A stored recurring rule has a frequency the engine does not recognise.
    ///
    /// The rule is left untouched and skipped by catch-up until it is fixed
    /// or deleted.
    #[error("recurring rule {rule_id} has an unrecognised frequency \"{frequency}\"")]
    MalformedRule {
        /// The ID of the offending rule.
        rule_id: RecurringRuleId,
        /// The raw frequency text as stored.
        frequency: String,
    },

    /// A stored recurring rule has a column that cannot be read as the expected type.
    ///
    /// Like [Error::MalformedRule], only this rule is skipped.
    #[error("recurring rule {rule_id} could not be read: {reason}")]
    UnreadableRule {
        /// The ID of the offending rule.
        rule_id: RecurringRuleId,
        /// What went wrong while reading the row.
        reason: String,
    },

    /// An update would have moved a rule's due date backwards.
    #[error(
        "the due date of recurring rule {rule_id} cannot move backwards from {current} to {proposed}"
    )]
    DueDateRegression {
        /// The ID of the rule.
        rule_id: RecurringRuleId,
        /// The stored due date.
        current: Timestamp,
        /// The rejected due date.
        proposed: Timestamp,
    },

    /// Date arithmetic produced a date outside the supported range.
    #[error("the date is outside of the supported range")]
    DateOutOfRange,

    /// A month number outside 1 to 12.
    #[error("{0} is not a valid month")]
    InvalidMonth(u8),

    /// More months of summaries were requested than are allowed.
    #[error(
        "{0} months were requested, but at most {max} can be summarised",
        max = MAX_SUMMARY_MONTHS
    )]
    TooManyMonths(u32),

    /// A catch-up pass was requested while another one is still running.
    #[error("recurring transactions are already being processed")]
    CatchUpInProgress,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// Tried to update a recurring rule that does not exist
    #[error("tried to update a recurring rule that is not in the database")]
    UpdateMissingRule,

    /// Tried to delete a recurring rule that does not exist
    #[error("tried to delete a recurring rule that is not in the database")]
    DeleteMissingRule,

    /// Tried to delete a category that does not exist
    #[error("tried to delete a category that is not in the database")]
    DeleteMissingCategory,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidAmount(_)
            | Error::InvalidCurrency(_)
            | Error::EmptyCategoryName
            | Error::InvalidFrequency(_)
            | Error::InvalidMonth(_)
            | Error::TooManyMonths(_)
            | Error::DateOutOfRange => StatusCode::BAD_REQUEST,
            Error::NotFound
            | Error::UpdateMissingTransaction
            | Error::DeleteMissingTransaction
            | Error::UpdateMissingRule
            | Error::DeleteMissingRule
            | Error::DeleteMissingCategory => StatusCode::NOT_FOUND,
            Error::DuplicateCategory(_) | Error::CatchUpInProgress => StatusCode::CONFLICT,
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "An unexpected error occurred, check the server logs for more details."
                    })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
