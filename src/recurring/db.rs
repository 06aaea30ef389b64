//! Database operations for recurring rules.

use rusqlite::{Connection, Row};
use time::Time;

use crate::{
    Error, RecurringRuleId, Timestamp,
    category::CategoryName,
    recurring::models::{Frequency, RecurringRule, RecurringRuleDetails},
    transaction::validate_amount,
};

/// A rule read from the database, or the reason it could not be understood.
pub type LoadedRule = Result<RecurringRule, Error>;

/// Insert a rule that is next due at `next_due_date` and whose occurrences
/// aim for the local `time_of_day`.
///
/// This does not generate any transactions, see [crate::create_recurring_rule].
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn insert_recurring_rule(
    details: RecurringRuleDetails,
    next_due_date: Timestamp,
    time_of_day: Time,
    connection: &Connection,
) -> Result<RecurringRule, Error> {
    validate_amount(details.amount)?;

    connection.execute(
        "INSERT INTO recurring_rule (amount, kind, category, frequency, next_due_date, time_of_day, note, currency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        (
            details.amount,
            details.kind,
            details.category.as_ref(),
            details.frequency,
            next_due_date,
            time_of_day,
            &details.note,
            &details.currency,
        ),
    )?;

    let id = connection.last_insert_rowid();

    Ok(RecurringRule {
        id,
        next_due_date,
        time_of_day,
        details,
    })
}

/// Retrieve a rule by `rule_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `rule_id` does not refer to a rule,
/// - [Error::MalformedRule] if the stored frequency is not recognised,
/// - [Error::UnreadableRule] if a stored column has the wrong type,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_recurring_rule(rule_id: RecurringRuleId, connection: &Connection) -> LoadedRule {
    connection
        .prepare(
            "SELECT id, amount, kind, category, frequency, next_due_date, time_of_day, note, currency
             FROM recurring_rule WHERE id = ?1;",
        )?
        .query_row([rule_id], map_rule_row)?
}

/// Retrieve all rules ordered by their next due date.
///
/// Rules that cannot be understood are returned as errors in place so
/// that one bad row does not hide the others.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_recurring_rules(connection: &Connection) -> Result<Vec<LoadedRule>, Error> {
    connection
        .prepare(
            "SELECT id, amount, kind, category, frequency, next_due_date, time_of_day, note, currency
             FROM recurring_rule ORDER BY next_due_date ASC, id ASC;",
        )?
        .query_map([], map_rule_row)?
        .map(|maybe_rule| maybe_rule.map_err(|error| error.into()))
        .collect()
}

/// Retrieve every rule whose due date is at or before `now`, oldest due date first.
///
/// As with [get_all_recurring_rules], a rule that cannot be understood is
/// an error in its own place in the list.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn list_due_rules(now: Timestamp, connection: &Connection) -> Result<Vec<LoadedRule>, Error> {
    connection
        .prepare(
            "SELECT id, amount, kind, category, frequency, next_due_date, time_of_day, note, currency
             FROM recurring_rule
             WHERE next_due_date <= ?1
             ORDER BY next_due_date ASC, id ASC;",
        )?
        .query_map([now], map_rule_row)?
        .map(|maybe_rule| maybe_rule.map_err(|error| error.into()))
        .collect()
}

/// Move a rule's due date to `next_due_date`.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingRule] if `rule_id` does not refer to a rule,
/// - [Error::DueDateRegression] if `next_due_date` is earlier than the stored due date,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_rule_next_due_date(
    rule_id: RecurringRuleId,
    next_due_date: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    let current: Timestamp = connection
        .query_row(
            "SELECT next_due_date FROM recurring_rule WHERE id = ?1",
            [rule_id],
            |row| row.get(0),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingRule,
            error => error.into(),
        })?;

    if next_due_date < current {
        return Err(Error::DueDateRegression {
            rule_id,
            current,
            proposed: next_due_date,
        });
    }

    connection.execute(
        "UPDATE recurring_rule SET next_due_date = ?1 WHERE id = ?2",
        (next_due_date, rule_id),
    )?;

    Ok(())
}

/// Delete a rule. Transactions it generated are kept.
///
/// # Errors
/// This function will return an error if there is an SQL error or if the rule doesn't exist.
pub fn delete_recurring_rule(
    rule_id: RecurringRuleId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM recurring_rule WHERE id = ?1", [rule_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingRule);
    }

    Ok(())
}

/// Create the recurring rule table in the database.
///
/// The frequency column is deliberately unconstrained text: rows written by
/// other versions of the app are reported as malformed instead of failing
/// the whole table.
pub fn create_recurring_rule_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_rule (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL CHECK (amount > 0),
                kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                category TEXT NOT NULL,
                frequency TEXT NOT NULL,
                next_due_date INTEGER NOT NULL,
                time_of_day TEXT NOT NULL,
                note TEXT,
                currency TEXT NOT NULL
            );",
        (),
    )?;

    // Catch-up selects on the due date at every start.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_recurring_rule_next_due_date
         ON recurring_rule(next_due_date)",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT INTO sqlite_sequence (name, seq)
         SELECT 'recurring_rule', 0
         WHERE NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = 'recurring_rule')",
        (),
    )?;

    Ok(())
}

fn map_rule_row(row: &Row) -> Result<LoadedRule, rusqlite::Error> {
    let rule_id = row.get(0)?;

    match read_rule_columns(rule_id, row) {
        Ok(loaded_rule) => Ok(loaded_rule),
        Err(error) => Ok(Err(Error::UnreadableRule {
            rule_id,
            reason: error.to_string(),
        })),
    }
}

fn read_rule_columns(id: RecurringRuleId, row: &Row) -> Result<LoadedRule, rusqlite::Error> {
    let amount = row.get(1)?;
    let kind = row.get(2)?;
    let raw_category: String = row.get(3)?;
    let raw_frequency: String = row.get(4)?;
    let next_due_date = row.get(5)?;
    let time_of_day = row.get(6)?;
    let note = row.get(7)?;
    let currency = row.get(8)?;

    let Ok(frequency) = raw_frequency.parse::<Frequency>() else {
        return Ok(Err(Error::MalformedRule {
            rule_id: id,
            frequency: raw_frequency,
        }));
    };

    Ok(Ok(RecurringRule {
        id,
        next_due_date,
        time_of_day,
        details: RecurringRuleDetails {
            amount,
            kind,
            category: CategoryName::new_unchecked(&raw_category),
            frequency,
            note,
            currency,
        },
    }))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::{datetime, time};

    use crate::{
        CurrencyCode, Error, Timestamp,
        category::CategoryName,
        db::initialize,
        recurring::models::{Frequency, RecurringRuleDetails},
        transaction::TransactionKind,
    };

    use super::{
        delete_recurring_rule, get_all_recurring_rules, get_recurring_rule, insert_recurring_rule,
        list_due_rules, update_rule_next_due_date,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn details() -> RecurringRuleDetails {
        RecurringRuleDetails {
            amount: 15.99,
            kind: TransactionKind::Expense,
            category: CategoryName::new_unchecked("Entertainment"),
            frequency: Frequency::Monthly,
            note: Some("Streaming".to_owned()),
            currency: CurrencyCode::default(),
        }
    }

    #[test]
    fn insert_and_get_rule() {
        let connection = get_test_connection();
        let due = Timestamp::from(datetime!(2025-06-01 08:00 UTC));

        let inserted = insert_recurring_rule(details(), due, time!(08:00), &connection)
            .expect("Could not insert rule");

        assert!(inserted.id > 0);
        assert_eq!(get_recurring_rule(inserted.id, &connection), Ok(inserted));
    }

    #[test]
    fn insert_rejects_non_positive_amount() {
        let connection = get_test_connection();
        let mut details = details();
        details.amount = 0.0;

        let result = insert_recurring_rule(
            details,
            Timestamp::from_millis(0),
            time!(00:00),
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidAmount(0.0)));
    }

    #[test]
    fn get_missing_rule_returns_not_found() {
        let connection = get_test_connection();

        assert_eq!(get_recurring_rule(42, &connection), Err(Error::NotFound));
    }

    #[test]
    fn list_due_rules_includes_rules_due_exactly_now() {
        let connection = get_test_connection();
        let now = Timestamp::from(datetime!(2025-06-15 12:00 UTC));
        let overdue = insert_recurring_rule(
            details(),
            Timestamp::from(datetime!(2025-05-01 12:00 UTC)),
            time!(12:00),
            &connection,
        )
        .unwrap();
        let due_now = insert_recurring_rule(details(), now, time!(12:00), &connection).unwrap();
        insert_recurring_rule(
            details(),
            Timestamp::from(datetime!(2025-06-15 12:00:00.001 UTC)),
            time!(12:00:00.001),
            &connection,
        )
        .unwrap();

        let due = list_due_rules(now, &connection).expect("Could not list due rules");

        assert_eq!(due, vec![Ok(overdue), Ok(due_now)]);
    }

    #[test]
    fn unknown_frequency_is_reported_per_rule() {
        let connection = get_test_connection();
        let good = insert_recurring_rule(
            details(),
            Timestamp::from_millis(10),
            time!(00:00),
            &connection,
        )
        .unwrap();
        connection
            .execute(
                "INSERT INTO recurring_rule (amount, kind, category, frequency, next_due_date, time_of_day, note, currency)
                 VALUES (1.0, 'expense', 'Food', 'daily', 5, '00:00:00', NULL, 'USD')",
                (),
            )
            .unwrap();
        let bad_id = connection.last_insert_rowid();

        let rules = get_all_recurring_rules(&connection).expect("Could not get rules");

        assert_eq!(
            rules,
            vec![
                Err(Error::MalformedRule {
                    rule_id: bad_id,
                    frequency: "daily".to_owned()
                }),
                Ok(good),
            ]
        );
    }

    #[test]
    fn column_of_the_wrong_type_is_reported_per_rule() {
        let connection = get_test_connection();
        connection
            .execute(
                "INSERT INTO recurring_rule (amount, kind, category, frequency, next_due_date, time_of_day, note, currency)
                 VALUES ('abc', 'expense', 'Food', 'monthly', 5, '00:00:00', NULL, 'USD')",
                (),
            )
            .unwrap();
        let bad_id = connection.last_insert_rowid();
        let good = insert_recurring_rule(
            details(),
            Timestamp::from_millis(10),
            time!(00:00),
            &connection,
        )
        .unwrap();

        let due = list_due_rules(Timestamp::from_millis(10), &connection)
            .expect("One unreadable row should not fail the whole listing");

        assert_eq!(due.len(), 2);
        assert!(matches!(
            &due[0],
            Err(Error::UnreadableRule { rule_id, .. }) if *rule_id == bad_id
        ));
        assert_eq!(due[1], Ok(good));
        assert!(matches!(
            get_recurring_rule(bad_id, &connection),
            Err(Error::UnreadableRule { .. })
        ));
    }

    #[test]
    fn due_date_can_advance() {
        let connection = get_test_connection();
        let rule = insert_recurring_rule(
            details(),
            Timestamp::from_millis(1_000),
            time!(00:00:01),
            &connection,
        )
        .unwrap();

        update_rule_next_due_date(rule.id, Timestamp::from_millis(2_000), &connection)
            .expect("Could not update due date");

        let updated = get_recurring_rule(rule.id, &connection).unwrap();
        assert_eq!(updated.next_due_date, Timestamp::from_millis(2_000));
    }

    #[test]
    fn due_date_cannot_move_backwards() {
        let connection = get_test_connection();
        let rule = insert_recurring_rule(
            details(),
            Timestamp::from_millis(1_000),
            time!(00:00:01),
            &connection,
        )
        .unwrap();

        let result = update_rule_next_due_date(rule.id, Timestamp::from_millis(999), &connection);

        assert_eq!(
            result,
            Err(Error::DueDateRegression {
                rule_id: rule.id,
                current: Timestamp::from_millis(1_000),
                proposed: Timestamp::from_millis(999),
            })
        );
        let unchanged = get_recurring_rule(rule.id, &connection).unwrap();
        assert_eq!(unchanged.next_due_date, Timestamp::from_millis(1_000));
    }

    #[test]
    fn update_missing_rule_fails() {
        let connection = get_test_connection();

        let result = update_rule_next_due_date(7, Timestamp::from_millis(0), &connection);

        assert_eq!(result, Err(Error::UpdateMissingRule));
    }

    #[test]
    fn delete_rule_succeeds() {
        let connection = get_test_connection();
        let rule = insert_recurring_rule(
            details(),
            Timestamp::from_millis(0),
            time!(00:00),
            &connection,
        )
        .unwrap();

        delete_recurring_rule(rule.id, &connection).expect("Could not delete rule");

        assert_eq!(get_recurring_rule(rule.id, &connection), Err(Error::NotFound));
    }

    #[test]
    fn delete_missing_rule_fails() {
        let connection = get_test_connection();

        assert_eq!(
            delete_recurring_rule(999_999, &connection),
            Err(Error::DeleteMissingRule)
        );
    }
}
