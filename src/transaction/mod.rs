//! Transaction management for the ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and managing transactions
//! - Route handlers for manual transaction CRUD

mod core;
mod endpoints;

pub use core::{
    Transaction, TransactionBuilder, TransactionFilter, TransactionKind, count_transactions,
    create_transaction, create_transaction_table, delete_transaction, get_transaction,
    get_transactions_in_range, update_transaction, validate_amount,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint, update_transaction_endpoint,
};
