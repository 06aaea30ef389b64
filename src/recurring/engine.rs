//! Pure schedule arithmetic for recurring rules.
//!
//! Nothing here touches the database. The functions take a rule and the
//! user's [Calendar] and return the transactions that should exist, leaving
//! it to the caller to persist them.

use time::{Date, Duration, Month, PrimitiveDateTime, Time};

use crate::{
    Calendar, Error, Timestamp,
    recurring::models::{Frequency, RecurringRule, RecurringRuleDetails},
    transaction::{Transaction, TransactionBuilder},
};

/// Prepended to the rule's note on every generated transaction.
pub const RECURRING_NOTE_PREFIX: &str = "Recurring: ";

/// The occurrence a due rule should produce and where the rule moves to afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DueOccurrence {
    /// The transaction to create, dated at the rule's old due date.
    pub transaction: TransactionBuilder,
    /// The rule's due date once `transaction` exists.
    pub next_due_date: Timestamp,
}

/// The occurrences generated up front for a new rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookahead {
    /// The generated transactions, oldest first.
    pub transactions: Vec<TransactionBuilder>,
    /// The first occurrence that was *not* generated.
    ///
    /// Storing this as the rule's due date hands over to catch-up without a
    /// gap or an overlap.
    pub next_due_date: Timestamp,
    /// The local time of day of `start`, which every occurrence aims for.
    pub time_of_day: Time,
}

/// Return the next occurrence of `rule` if it is due at `now`.
///
/// A rule is due when its due date is at or before `now`. Exactly one period
/// is advanced per call, so a rule that is several periods behind needs
/// repeated calls. A `now` earlier than the due date, including one caused
/// by a clock that was set backwards, simply means nothing is due.
///
/// # Errors
/// Returns [Error::DateOutOfRange] if the next due date cannot be represented.
pub fn occurrences_due(
    rule: &RecurringRule,
    now: Timestamp,
    calendar: &Calendar,
) -> Result<Option<DueOccurrence>, Error> {
    if rule.next_due_date > now {
        return Ok(None);
    }

    let next_due_date = advance(
        rule.next_due_date,
        rule.details.frequency,
        rule.time_of_day,
        calendar,
    )?;

    Ok(Some(DueOccurrence {
        transaction: occurrence(&rule.details, rule.next_due_date),
        next_due_date,
    }))
}

/// Generate `occurrence_count` occurrences of a new rule starting at `start`.
///
/// Each occurrence is one period after the previous one, using the same
/// arithmetic as [occurrences_due].
///
/// # Errors
/// Returns [Error::DateOutOfRange] if a date cannot be represented.
pub fn generate_lookahead(
    details: &RecurringRuleDetails,
    start: Timestamp,
    occurrence_count: u32,
    calendar: &Calendar,
) -> Result<Lookahead, Error> {
    let time_of_day = calendar.to_local(start)?.time();
    let mut transactions = Vec::with_capacity(occurrence_count as usize);
    let mut date = start;

    for _ in 0..occurrence_count {
        transactions.push(occurrence(details, date));
        date = advance(date, details.frequency, time_of_day, calendar)?;
    }

    Ok(Lookahead {
        transactions,
        next_due_date: date,
        time_of_day,
    })
}

/// Move `date` forward by one period of `frequency` in local time.
///
/// The result is on the next local date of the schedule at `time_of_day`,
/// so a weekly rule keeps firing at the same clock time across daylight
/// saving changes. If that time is skipped by the clocks going forward, see
/// [Calendar::from_local], the occurrence after it is back at `time_of_day`.
///
/// # Errors
/// Returns [Error::DateOutOfRange] if the result cannot be represented.
pub fn advance(
    date: Timestamp,
    frequency: Frequency,
    time_of_day: Time,
    calendar: &Calendar,
) -> Result<Timestamp, Error> {
    let local = calendar.to_local(date)?;

    let next_date = match frequency {
        Frequency::Weekly => local
            .date()
            .checked_add(Duration::weeks(1))
            .ok_or(Error::DateOutOfRange)?,
        Frequency::Monthly => add_month_clamped(local.date())?,
    };

    Ok(calendar.from_local(PrimitiveDateTime::new(next_date, time_of_day)))
}

/// The same day in the following month, or that month's last day if it is shorter.
fn add_month_clamped(date: Date) -> Result<Date, Error> {
    let year = if date.month() == Month::December {
        date.year() + 1
    } else {
        date.year()
    };
    let month = date.month().next();

    (1..=date.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())
        .ok_or(Error::DateOutOfRange)
}

fn occurrence(details: &RecurringRuleDetails, date: Timestamp) -> TransactionBuilder {
    let note = format!(
        "{RECURRING_NOTE_PREFIX}{}",
        details.note.as_deref().unwrap_or_default()
    );

    Transaction::build(details.amount, details.kind, details.category.clone(), date)
        .note(Some(note))
        .currency(details.currency.clone())
}

#[cfg(test)]
mod tests {
    use time::{
        Duration,
        macros::{date, datetime, time},
    };

    use crate::{
        Calendar, CurrencyCode, Timestamp,
        category::CategoryName,
        recurring::models::{Frequency, RecurringRule, RecurringRuleDetails},
        transaction::TransactionKind,
    };

    use super::{add_month_clamped, advance, generate_lookahead, occurrences_due};

    fn utc() -> Calendar {
        Calendar::new("Etc/UTC").unwrap()
    }

    fn details(frequency: Frequency) -> RecurringRuleDetails {
        RecurringRuleDetails {
            amount: 50.0,
            kind: TransactionKind::Expense,
            category: CategoryName::new_unchecked("Bills"),
            frequency,
            note: Some("Rent".to_owned()),
            currency: CurrencyCode::new_unchecked("NZD"),
        }
    }

    fn rule(frequency: Frequency, next_due_date: Timestamp) -> RecurringRule {
        RecurringRule {
            id: 1,
            next_due_date,
            time_of_day: utc().to_local(next_due_date).unwrap().time(),
            details: details(frequency),
        }
    }

    #[test]
    fn not_due_before_due_date() {
        let due = Timestamp::from(datetime!(2025-05-10 09:00 UTC));
        let rule = rule(Frequency::Monthly, due);

        let result = occurrences_due(&rule, Timestamp::from_millis(due.as_millis() - 1), &utc());

        assert_eq!(result, Ok(None));
    }

    #[test]
    fn clock_set_far_backwards_is_not_an_error() {
        let rule = rule(
            Frequency::Weekly,
            Timestamp::from(datetime!(2025-05-10 09:00 UTC)),
        );

        let result = occurrences_due(&rule, Timestamp::from(datetime!(1999-01-01 00:00 UTC)), &utc());

        assert_eq!(result, Ok(None));
    }

    #[test]
    fn monthly_rule_due_now_produces_one_occurrence() {
        let due = Timestamp::from(datetime!(2025-05-10 09:00 UTC));
        let rule = rule(Frequency::Monthly, due);

        let occurrence = occurrences_due(&rule, due, &utc())
            .expect("Could not compute occurrence")
            .expect("Rule should be due");

        assert_eq!(occurrence.transaction.amount, 50.0);
        assert_eq!(occurrence.transaction.kind, TransactionKind::Expense);
        assert_eq!(occurrence.transaction.date, due);
        assert_eq!(occurrence.transaction.category.as_ref(), "Bills");
        assert_eq!(
            occurrence.transaction.currency,
            CurrencyCode::new_unchecked("NZD")
        );
        assert_eq!(
            occurrence.next_due_date,
            Timestamp::from(datetime!(2025-06-10 09:00 UTC))
        );
    }

    #[test]
    fn occurrence_note_marks_recurring_origin() {
        let due = Timestamp::from_millis(0);
        let mut without_note = rule(Frequency::Weekly, due);
        without_note.details.note = None;

        let with_note = occurrences_due(&rule(Frequency::Weekly, due), due, &utc())
            .unwrap()
            .unwrap();
        let without_note = occurrences_due(&without_note, due, &utc())
            .unwrap()
            .unwrap();

        assert_eq!(with_note.transaction.note.as_deref(), Some("Recurring: Rent"));
        assert_eq!(without_note.transaction.note.as_deref(), Some("Recurring: "));
    }

    #[test]
    fn weekly_rule_advances_one_period_per_call() {
        let start = datetime!(2025-03-03 08:00 UTC);
        let now = Timestamp::from(start + Duration::days(20));
        let mut rule = rule(Frequency::Weekly, Timestamp::from(start));
        let mut dates = Vec::new();

        while let Some(occurrence) = occurrences_due(&rule, now, &utc()).unwrap() {
            dates.push(occurrence.transaction.date);
            rule.next_due_date = occurrence.next_due_date;
            if dates.len() == 2 {
                assert_eq!(
                    rule.next_due_date,
                    Timestamp::from(start + Duration::days(14))
                );
            }
        }

        assert_eq!(
            dates,
            vec![
                Timestamp::from(start),
                Timestamp::from(start + Duration::days(7)),
                Timestamp::from(start + Duration::days(14)),
            ]
        );
        assert_eq!(rule.next_due_date, Timestamp::from(start + Duration::days(21)));
    }

    #[test]
    fn weekly_rule_keeps_local_time_across_daylight_saving() {
        // New Zealand daylight saving starts on 2025-09-28.
        let calendar = Calendar::new("Pacific/Auckland").unwrap();
        let before = Timestamp::from(datetime!(2025-09-22 09:00 +12));

        let after = advance(before, Frequency::Weekly, time!(09:00), &calendar).unwrap();

        assert_eq!(after, Timestamp::from(datetime!(2025-09-29 09:00 +13)));
        assert_eq!(calendar.to_local(after).unwrap().time(), time!(09:00));
        assert_eq!(
            after.as_millis() - before.as_millis(),
            Duration::hours(7 * 24 - 1).whole_milliseconds() as i64
        );
    }

    #[test]
    fn weekly_rule_returns_to_its_time_after_a_skipped_hour() {
        // Clocks in New York jump from 02:00 to 03:00 on 2025-03-09.
        let calendar = Calendar::new("America/New_York").unwrap();
        let start = Timestamp::from(datetime!(2025-03-02 02:30 -5));
        let mut due = start;
        let mut local_times = Vec::new();

        for _ in 0..3 {
            due = advance(due, Frequency::Weekly, time!(02:30), &calendar).unwrap();
            local_times.push(calendar.to_local(due).unwrap());
        }

        assert_eq!(
            local_times,
            vec![
                datetime!(2025-03-09 03:30 -4),
                datetime!(2025-03-16 02:30 -4),
                datetime!(2025-03-23 02:30 -4),
            ]
        );
    }

    #[test]
    fn lookahead_through_a_skipped_hour_keeps_the_start_time() {
        let calendar = Calendar::new("America/New_York").unwrap();
        let start = Timestamp::from(datetime!(2025-03-02 02:30 -5));

        let lookahead =
            generate_lookahead(&details(Frequency::Weekly), start, 3, &calendar).unwrap();

        assert_eq!(lookahead.time_of_day, time!(02:30));
        assert_eq!(
            lookahead.transactions[2].date,
            Timestamp::from(datetime!(2025-03-16 02:30 -4))
        );
        assert_eq!(
            lookahead.next_due_date,
            Timestamp::from(datetime!(2025-03-23 02:30 -4))
        );
    }

    #[test]
    fn monthly_rule_uses_local_calendar_date() {
        // 2025-01-31 20:00 UTC is already 1 February in Auckland.
        let calendar = Calendar::new("Pacific/Auckland").unwrap();
        let due = Timestamp::from(datetime!(2025-01-31 20:00 UTC));

        let next = advance(due, Frequency::Monthly, time!(09:00), &calendar).unwrap();

        assert_eq!(next, Timestamp::from(datetime!(2025-03-01 09:00 +13)));
    }

    #[test]
    fn month_end_clamps_into_shorter_months() {
        assert_eq!(add_month_clamped(date!(2025-01-31)), Ok(date!(2025-02-28)));
        assert_eq!(add_month_clamped(date!(2024-01-31)), Ok(date!(2024-02-29)));
        assert_eq!(add_month_clamped(date!(2025-03-31)), Ok(date!(2025-04-30)));
        assert_eq!(add_month_clamped(date!(2025-08-31)), Ok(date!(2025-09-30)));
        assert_eq!(add_month_clamped(date!(2025-12-31)), Ok(date!(2026-01-31)));
        assert_eq!(add_month_clamped(date!(2025-04-15)), Ok(date!(2025-05-15)));
    }

    #[test]
    fn month_end_clamping_never_skips_a_month() {
        let mut due = Timestamp::from(datetime!(2025-01-31 12:00 UTC));
        let mut months = Vec::new();

        for _ in 0..12 {
            due = advance(due, Frequency::Monthly, time!(12:00), &utc()).unwrap();
            months.push(utc().month_of(due).unwrap().1 as u8);
        }

        assert_eq!(months, vec![2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 1]);
        // Clamping is relative to the previous due date, so the day drifts to the 28th.
        assert_eq!(due, Timestamp::from(datetime!(2026-01-28 12:00 UTC)));
    }

    #[test]
    fn lookahead_generates_requested_occurrences() {
        let start = Timestamp::from(datetime!(2025-01-15 10:00 UTC));

        let lookahead = generate_lookahead(&details(Frequency::Monthly), start, 12, &utc())
            .expect("Could not generate look-ahead");

        assert_eq!(lookahead.transactions.len(), 12);
        assert_eq!(lookahead.transactions[0].date, start);
        assert_eq!(
            lookahead.transactions[11].date,
            Timestamp::from(datetime!(2025-12-15 10:00 UTC))
        );
        assert_eq!(
            lookahead.next_due_date,
            Timestamp::from(datetime!(2026-01-15 10:00 UTC))
        );
    }

    #[test]
    fn weekly_lookahead_advances_by_weeks() {
        let start = datetime!(2025-01-15 10:00 UTC);

        let lookahead =
            generate_lookahead(&details(Frequency::Weekly), Timestamp::from(start), 3, &utc())
                .unwrap();

        let dates: Vec<Timestamp> = lookahead
            .transactions
            .iter()
            .map(|transaction| transaction.date)
            .collect();
        assert_eq!(
            dates,
            vec![
                Timestamp::from(start),
                Timestamp::from(start + Duration::weeks(1)),
                Timestamp::from(start + Duration::weeks(2)),
            ]
        );
        assert_eq!(
            lookahead.next_due_date,
            Timestamp::from(start + Duration::weeks(3))
        );
    }

    #[test]
    fn empty_lookahead_leaves_start_due() {
        let start = Timestamp::from(datetime!(2025-01-15 10:00 UTC));

        let lookahead = generate_lookahead(&details(Frequency::Weekly), start, 0, &utc()).unwrap();

        assert!(lookahead.transactions.is_empty());
        assert_eq!(lookahead.next_due_date, start);
    }
}
