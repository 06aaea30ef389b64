//! Turns due recurring rules into stored transactions.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use serde::Serialize;

use crate::{
    Calendar, Error, RecurringRuleId, Timestamp,
    recurring::{
        db::{get_recurring_rule, insert_recurring_rule, list_due_rules, update_rule_next_due_date},
        engine::{generate_lookahead, occurrences_due},
        models::{RecurringRule, RecurringRuleDetails},
    },
    transaction::{Transaction, create_transaction, validate_amount},
};

/// A rule that could not be brought up to date during a catch-up pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFailure {
    /// The rule that was skipped.
    pub rule_id: RecurringRuleId,
    /// Why it was skipped.
    pub reason: String,
}

/// The outcome of a catch-up pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatchUpReport {
    /// The number of rules that were due when the pass started.
    pub rules_processed: usize,
    /// The number of transactions created.
    pub materialized: usize,
    /// Rules that were skipped, in the order they were encountered.
    pub failures: Vec<RuleFailure>,
}

/// Materializes every overdue occurrence of every recurring rule.
///
/// Only one pass runs at a time. Cloning the runner shares the in-flight
/// guard, so a pass started at startup and one requested over HTTP never
/// overlap.
#[derive(Debug, Clone)]
pub struct CatchUpRunner {
    db_connection: Arc<Mutex<Connection>>,
    calendar: Calendar,
    in_flight: Arc<Mutex<()>>,
}

impl CatchUpRunner {
    /// Create a runner that writes to `db_connection` and does date arithmetic in `calendar`.
    pub fn new(db_connection: Arc<Mutex<Connection>>, calendar: Calendar) -> Self {
        Self {
            db_connection,
            calendar,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Bring every rule that is due at `now` up to date.
    ///
    /// Each occurrence is written in its own database transaction together
    /// with the rule's new due date, and the database lock is released
    /// between occurrences. A rule that fails is logged, recorded in the
    /// report and skipped, and the pass carries on with the next rule.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::CatchUpInProgress] if another pass is running,
    /// - [Error::DatabaseLockError] if the database lock is poisoned before any rule is processed,
    /// - or [Error::SqlError] if the due rules cannot be listed.
    pub fn run(&self, now: Timestamp) -> Result<CatchUpReport, Error> {
        let _in_flight = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(Error::CatchUpInProgress),
            // The previous pass panicked, but every step it took was atomic.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let due_rules = {
            let connection = self.lock_connection()?;
            list_due_rules(now, &connection)?
        };

        let mut report = CatchUpReport {
            rules_processed: due_rules.len(),
            ..Default::default()
        };

        for loaded_rule in due_rules {
            let rule = match loaded_rule {
                Ok(rule) => rule,
                Err(
                    error @ (Error::MalformedRule { rule_id, .. }
                    | Error::UnreadableRule { rule_id, .. }),
                ) => {
                    tracing::warn!("Skipping recurring rule {rule_id}: {error}");
                    report.failures.push(RuleFailure {
                        rule_id,
                        reason: error.to_string(),
                    });
                    continue;
                }
                Err(error) => return Err(error),
            };

            self.catch_up_rule(&rule, now, &mut report);
        }

        tracing::info!(
            "Catch-up processed {} rule(s), created {} transaction(s), {} failure(s)",
            report.rules_processed,
            report.materialized,
            report.failures.len()
        );

        Ok(report)
    }

    fn catch_up_rule(&self, rule: &RecurringRule, now: Timestamp, report: &mut CatchUpReport) {
        loop {
            let step = self.lock_connection().and_then(|connection| {
                materialize_next_occurrence(rule.id, now, &self.calendar, &connection)
            });

            match step {
                Ok(Some(transaction)) => {
                    tracing::debug!(
                        "Created transaction {} for recurring rule {} dated {}",
                        transaction.id,
                        rule.id,
                        transaction.date
                    );
                    report.materialized += 1;
                }
                Ok(None) => break,
                // Deleted since the due rules were listed.
                Err(Error::NotFound) => break,
                Err(error) => {
                    tracing::error!("Could not catch up recurring rule {}: {error}", rule.id);
                    report.failures.push(RuleFailure {
                        rule_id: rule.id,
                        reason: error.to_string(),
                    });
                    break;
                }
            }
        }
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

#[cfg(test)]
impl CatchUpRunner {
    /// Hold the in-flight guard as if a pass were running.
    pub(crate) fn in_flight_guard_for_tests(&self) -> MutexGuard<'_, ()> {
        self.in_flight.lock().unwrap()
    }
}

/// Materialize the occurrence of `rule_id` that is due at `now`, if any.
///
/// The new transaction and the rule's advanced due date are committed
/// together, or not at all.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the rule does not exist,
/// - [Error::MalformedRule] if the stored rule cannot be understood,
/// - [Error::DateOutOfRange] if the next due date cannot be represented,
/// - or [Error::SqlError] if either write fails.
pub fn materialize_next_occurrence(
    rule_id: RecurringRuleId,
    now: Timestamp,
    calendar: &Calendar,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    let sql_transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let rule = get_recurring_rule(rule_id, &sql_transaction)?;

    let Some(occurrence) = occurrences_due(&rule, now, calendar)? else {
        return Ok(None);
    };

    let transaction = create_transaction(occurrence.transaction, &sql_transaction)?;
    update_rule_next_due_date(rule_id, occurrence.next_due_date, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(Some(transaction))
}

/// A new recurring rule and the transactions generated for it up front.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedRecurringRule {
    /// The stored rule, due at the first occurrence that was not generated.
    pub rule: RecurringRule,
    /// The look-ahead transactions, oldest first.
    pub transactions: Vec<Transaction>,
}

/// Store a new recurring rule whose first occurrence is at `start`.
///
/// `lookahead_count` occurrences are created immediately, and the rule is
/// stored as due at the occurrence after the last of them so that catch-up
/// continues where the look-ahead stopped.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - [Error::DateOutOfRange] if an occurrence date cannot be represented,
/// - or [Error::SqlError] if any write fails, in which case nothing is stored.
pub fn create_recurring_rule(
    details: RecurringRuleDetails,
    start: Timestamp,
    lookahead_count: u32,
    calendar: &Calendar,
    connection: &Connection,
) -> Result<CreatedRecurringRule, Error> {
    validate_amount(details.amount)?;

    let lookahead = generate_lookahead(&details, start, lookahead_count, calendar)?;

    let sql_transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let rule = insert_recurring_rule(
        details,
        lookahead.next_due_date,
        lookahead.time_of_day,
        &sql_transaction,
    )?;
    let transactions = lookahead
        .transactions
        .into_iter()
        .map(|builder| create_transaction(builder, &sql_transaction))
        .collect::<Result<Vec<_>, _>>()?;

    sql_transaction.commit()?;

    Ok(CreatedRecurringRule { rule, transactions })
}
