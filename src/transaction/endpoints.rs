//! Route handlers for manually entered transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Month;

use crate::{
    AppState, Calendar, CurrencyCode, Error, Timestamp,
    category::CategoryName,
    database_id::TransactionId,
    transaction::core::{
        Transaction, TransactionBuilder, TransactionFilter, TransactionKind, create_transaction,
        delete_transaction, get_transaction, get_transactions_in_range, update_transaction,
    },
};

/// The state needed for the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub calendar: Calendar,
    pub default_currency: CurrencyCode,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            calendar: state.calendar.clone(),
            default_currency: state.default_currency.clone(),
        }
    }
}

/// The request body for creating or editing a transaction.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionForm {
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    /// Defaults to the current time.
    pub date: Option<Timestamp>,
    pub note: Option<String>,
    /// Defaults to the ledger's default currency.
    pub currency: Option<String>,
}

impl TransactionForm {
    fn into_builder(self, default_currency: &CurrencyCode) -> Result<TransactionBuilder, Error> {
        let category = CategoryName::new(&self.category)?;
        let currency = match self.currency {
            Some(code) => CurrencyCode::new(&code)?,
            None => default_currency.clone(),
        };
        let note = self.note.filter(|note| !note.trim().is_empty());

        Ok(Transaction::build(
            self.amount,
            self.kind,
            category,
            self.date.unwrap_or_else(Timestamp::now),
        )
        .note(note)
        .currency(currency))
    }
}

/// Query parameters for listing the transactions of a month.
///
/// Missing year or month default to the current local year and month.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub kind: Option<TransactionKind>,
}

fn month_bounds(
    query: &TransactionQuery,
    calendar: &Calendar,
) -> Result<(Timestamp, Timestamp), Error> {
    let (current_year, current_month) = calendar.month_of(Timestamp::now())?;
    let year = query.year.unwrap_or(current_year);
    let month = match query.month {
        Some(number) => Month::try_from(number).map_err(|_| Error::InvalidMonth(number))?,
        None => current_month,
    };
    let next_year = if month == Month::December {
        year.checked_add(1).ok_or(Error::DateOutOfRange)?
    } else {
        year
    };

    Ok((
        calendar.month_start(year, month)?,
        calendar.month_start(next_year, month.next())?,
    ))
}

/// A route handler for listing the transactions of one month, newest first.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Query(query): Query<TransactionQuery>,
) -> Response {
    let (start, end) = match month_bounds(&query, &state.calendar) {
        Ok(bounds) => bounds,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let filter = TransactionFilter {
        kind: query.kind,
        currency: None,
    };

    match get_transactions_in_range(start, end, &filter, &connection) {
        Ok(transactions) => Json(transactions).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for getting a single transaction.
pub async fn get_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<TransactionState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_transaction(transaction_id, &connection) {
        Ok(transaction) => Json(transaction).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for creating a new transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Json(form): Json<TransactionForm>,
) -> Response {
    let builder = match form.into_builder(&state.default_currency) {
        Ok(builder) => builder,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_transaction(builder, &connection) {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(error) => {
            tracing::error!("Could not create transaction: {error}");
            error.into_response()
        }
    }
}

/// A route handler for editing an existing transaction.
pub async fn update_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<TransactionState>,
    Json(form): Json<TransactionForm>,
) -> Response {
    let builder = match form.into_builder(&state.default_currency) {
        Ok(builder) => builder,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match update_transaction(transaction_id, builder, &connection) {
        Ok(transaction) => Json(transaction).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<TransactionState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_transaction(transaction_id, &connection) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(Error::DeleteMissingTransaction) => Error::DeleteMissingTransaction.into_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting transaction {transaction_id}: {error}"
            );
            error.into_response()
        }
    }
}
