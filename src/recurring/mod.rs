//! Recurring rules and their materialization into transactions.
//!
//! This module contains:
//! - The `RecurringRule` model and its `Frequency`
//! - The schedule engine, which works out what is due without touching the database
//! - Database functions for storing rules
//! - The catch-up runner that writes due occurrences
//! - Route handlers for managing rules and triggering a catch-up

mod db;
mod endpoints;
mod engine;
mod models;
mod runner;

pub use db::{
    LoadedRule, create_recurring_rule_table, delete_recurring_rule, get_all_recurring_rules,
    get_recurring_rule, insert_recurring_rule, list_due_rules, update_rule_next_due_date,
};
pub use endpoints::{
    catch_up_endpoint, create_recurring_rule_endpoint, delete_recurring_rule_endpoint,
    get_recurring_rules_endpoint,
};
pub use engine::{
    DueOccurrence, Lookahead, RECURRING_NOTE_PREFIX, advance, generate_lookahead, occurrences_due,
};
pub use models::{Frequency, RecurringRule, RecurringRuleDetails};
pub use runner::{
    CatchUpReport, CatchUpRunner, CreatedRecurringRule, RuleFailure, create_recurring_rule,
    materialize_next_occurrence,
};
