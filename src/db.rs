//! Creates the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, category::create_category_table, recurring::create_recurring_rule_table,
    transaction::create_transaction_table,
};

/// Create all of the application's tables if they do not exist.
///
/// The tables are created inside one exclusive transaction, so a partially
/// initialized database is never left behind.
///
/// # Errors
/// Returns an [Error::SqlError] if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_recurring_rule_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
