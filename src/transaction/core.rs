//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    CurrencyCode, Error, Timestamp, category::CategoryName, database_id::TransactionId,
};

// ============================================================================
// MODELS
// ============================================================================

#[derive(Debug, Error)]
#[error("\"{0}\" is not a valid transaction kind")]
pub struct TransactionKindError(String);

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in, e.g. wages.
    Income,
    /// Money going out, e.g. rent.
    Expense,
}

impl TransactionKind {
    /// The name used for this kind in the database and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = TransactionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(TransactionKindError(other.to_owned())),
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money spent or earned, always positive.
    pub amount: f64,
    /// Whether the money was spent or earned.
    pub kind: TransactionKind,
    /// The name of the category the transaction belongs to.
    pub category: CategoryName,
    /// When the transaction happened.
    pub date: Timestamp,
    /// A text description of what the transaction was for.
    pub note: Option<String>,
    /// The currency of `amount`.
    pub currency: CurrencyCode,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        amount: f64,
        kind: TransactionKind,
        category: CategoryName,
        date: Timestamp,
    ) -> TransactionBuilder {
        TransactionBuilder {
            amount,
            kind,
            category,
            date,
            note: None,
            currency: CurrencyCode::default(),
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// The note defaults to none and the currency to US dollars.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The amount of money, must be positive.
    pub amount: f64,

    /// Whether the money was spent or earned.
    pub kind: TransactionKind,

    /// The category name. Categories are referenced by name only, so this
    /// may name a category that has since been deleted.
    pub category: CategoryName,

    /// When the transaction happened, or for generated transactions, when it is scheduled.
    pub date: Timestamp,

    /// An optional description.
    ///
    /// Transactions generated from a recurring rule carry the rule's note
    /// prefixed with "Recurring: ".
    pub note: Option<String>,

    /// The currency of `amount`.
    pub currency: CurrencyCode,
}

impl TransactionBuilder {
    /// Set the note for the transaction.
    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    /// Set the currency for the transaction.
    pub fn currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }
}

/// Check that `amount` can be stored as a transaction or rule amount.
///
/// # Errors
/// Returns [Error::InvalidAmount] if `amount` is not a finite number greater than zero.
pub fn validate_amount(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount(amount))
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_amount(builder.amount)?;

    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (amount, kind, category, date, note, currency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, amount, kind, category, date, note, currency",
        )?
        .query_row(
            (
                builder.amount,
                builder.kind,
                builder.category.as_ref(),
                builder.date,
                builder.note,
                builder.currency,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, amount, kind, category, date, note, currency
             FROM \"transaction\" WHERE id = :id",
        )?
        .query_one(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Replace every field of the transaction `id` with the values in `builder`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_amount(builder.amount)?;

    let rows_affected = connection.execute(
        "UPDATE \"transaction\"
         SET amount = ?1, kind = ?2, category = ?3, date = ?4, note = ?5, currency = ?6
         WHERE id = ?7",
        (
            builder.amount,
            builder.kind,
            builder.category.as_ref(),
            builder.date,
            &builder.note,
            &builder.currency,
            id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(Transaction {
        id,
        amount: builder.amount,
        kind: builder.kind,
        category: builder.category,
        date: builder.date,
        note: builder.note,
        currency: builder.currency,
    })
}

/// Delete a transaction by ID.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Which transactions [get_transactions_in_range] should return.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only include transactions of this kind.
    pub kind: Option<TransactionKind>,
    /// Only include transactions in this currency.
    pub currency: Option<CurrencyCode>,
}

/// Retrieve transactions dated in `[start, end)`, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_transactions_in_range(
    start: Timestamp,
    end: Timestamp,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, amount, kind, category, date, note, currency
             FROM \"transaction\"
             WHERE date >= ?1 AND date < ?2
               AND (?3 IS NULL OR kind = ?3)
               AND (?4 IS NULL OR currency = ?4)
             ORDER BY date DESC, id DESC",
        )?
        .query_map(
            (start, end, filter.kind, filter.currency.as_ref()),
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL CHECK (amount > 0),
                kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                category TEXT NOT NULL,
                date INTEGER NOT NULL,
                note TEXT,
                currency TEXT NOT NULL
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT INTO sqlite_sequence (name, seq)
         SELECT 'transaction', 0
         WHERE NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = 'transaction')",
        (),
    )?;

    // Monthly listings and summaries filter on date.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_date ON \"transaction\"(date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let kind = row.get(2)?;
    let raw_category: String = row.get(3)?;
    let date = row.get(4)?;
    let note = row.get(5)?;
    let currency = row.get(6)?;

    Ok(Transaction {
        id,
        amount,
        kind,
        category: CategoryName::new_unchecked(&raw_category),
        date,
        note,
        currency,
    })
}

// ============================================================================
// TESTS
// ============================================================================
