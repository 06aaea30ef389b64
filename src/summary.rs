//! Monthly income and expense totals.
//!
//! Months are calendar months in the user's time zone, so a transaction at
//! 11pm on the 31st local time counts towards that month even when it is
//! already the 1st in UTC.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Month;

use crate::{
    AppState, Calendar, CurrencyCode, Error, Timestamp,
    transaction::{TransactionFilter, TransactionKind, get_transactions_in_range},
};

/// The number of months shown when the client does not ask for a specific number.
pub const DEFAULT_SUMMARY_MONTHS: u32 = 6;

/// The most months a single summary request may cover, ten years.
pub const MAX_SUMMARY_MONTHS: u32 = 120;

/// The totals for one calendar month in a single currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// The calendar year.
    pub year: i32,
    /// The month number, 1 for January.
    pub month: u8,
    /// The currency all amounts are in.
    pub currency: CurrencyCode,
    /// The sum of income transactions.
    pub income: f64,
    /// The sum of expense transactions, as a positive number.
    pub expenses: f64,
    /// Income minus expenses.
    pub balance: f64,
}

/// Get the totals for the `month_count` months up to and including the month of `now`.
///
/// Only transactions in `currency` are counted. Months without any
/// transactions are included with zero totals. The result is ordered oldest first.
///
/// # Errors
/// This function will return a:
/// - [Error::TooManyMonths] if `month_count` is more than [MAX_SUMMARY_MONTHS],
/// - [Error::DateOutOfRange] if the months cannot be represented,
/// - or [Error::SqlError] if there is an SQL error.
pub fn get_monthly_summaries(
    now: Timestamp,
    month_count: u32,
    currency: &CurrencyCode,
    calendar: &Calendar,
    connection: &Connection,
) -> Result<Vec<MonthlySummary>, Error> {
    if month_count > MAX_SUMMARY_MONTHS {
        return Err(Error::TooManyMonths(month_count));
    }

    if month_count == 0 {
        return Ok(Vec::new());
    }

    let (current_year, current_month) = calendar.month_of(now)?;
    let current_index = month_index(current_year, current_month);
    let first_index = current_index - i64::from(month_count - 1);
    let months = (first_index..=current_index)
        .map(month_from_index)
        .collect::<Result<Vec<_>, _>>()?;

    let (first_year, first_month) = month_from_index(first_index)?;
    let (next_year, next_month) = month_from_index(current_index + 1)?;
    let start = calendar.month_start(first_year, first_month)?;
    let end = calendar.month_start(next_year, next_month)?;

    let filter = TransactionFilter {
        kind: None,
        currency: Some(currency.clone()),
    };
    let transactions = get_transactions_in_range(start, end, &filter, connection)?;

    let mut totals: HashMap<(i32, Month), (f64, f64)> = HashMap::new();
    for transaction in transactions {
        let (income, expenses) = totals
            .entry(calendar.month_of(transaction.date)?)
            .or_insert((0.0, 0.0));

        match transaction.kind {
            TransactionKind::Income => *income += transaction.amount,
            TransactionKind::Expense => *expenses += transaction.amount,
        }
    }

    Ok(months
        .into_iter()
        .map(|(year, month)| {
            let (income, expenses) = totals.get(&(year, month)).copied().unwrap_or_default();

            MonthlySummary {
                year,
                month: month as u8,
                currency: currency.clone(),
                income,
                expenses,
                balance: income - expenses,
            }
        })
        .collect())
}

/// The number of months since January of year zero.
fn month_index(year: i32, month: Month) -> i64 {
    i64::from(year) * 12 + i64::from(month as u8) - 1
}

fn month_from_index(index: i64) -> Result<(i32, Month), Error> {
    let year = i32::try_from(index.div_euclid(12)).map_err(|_| Error::DateOutOfRange)?;
    let month =
        Month::try_from(index.rem_euclid(12) as u8 + 1).map_err(|_| Error::DateOutOfRange)?;

    Ok((year, month))
}

/// The state needed for the summary endpoint.
#[derive(Debug, Clone)]
pub struct SummaryState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The user's calendar, which decides month boundaries.
    pub calendar: Calendar,
    /// The currency summarised when the client does not pick one.
    pub default_currency: CurrencyCode,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            calendar: state.calendar.clone(),
            default_currency: state.default_currency.clone(),
        }
    }
}

/// Query parameters for the summary endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// How many months to include, defaults to [DEFAULT_SUMMARY_MONTHS]
    /// and may not exceed [MAX_SUMMARY_MONTHS].
    pub months: Option<u32>,
    /// Which currency to summarise, defaults to the ledger's default currency.
    pub currency: Option<String>,
}

/// A route handler for the monthly totals of recent months.
pub async fn get_summary_endpoint(
    State(state): State<SummaryState>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    let currency = match query.currency {
        Some(code) => match CurrencyCode::new(&code) {
            Ok(currency) => currency,
            Err(error) => return error.into_response(),
        },
        None => state.default_currency.clone(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_monthly_summaries(
        Timestamp::now(),
        query.months.unwrap_or(DEFAULT_SUMMARY_MONTHS),
        &currency,
        &state.calendar,
        &connection,
    ) {
        Ok(summaries) => Json(summaries).into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Calendar, CurrencyCode, Error, Timestamp,
        category::CategoryName,
        db::initialize,
        transaction::{Transaction, TransactionKind, create_transaction},
    };

    use super::{MAX_SUMMARY_MONTHS, MonthlySummary, get_monthly_summaries};

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn insert(
        amount: f64,
        kind: TransactionKind,
        date: Timestamp,
        currency: &str,
        connection: &Connection,
    ) {
        create_transaction(
            Transaction::build(amount, kind, CategoryName::new_unchecked("Food"), date)
                .currency(CurrencyCode::new_unchecked(currency)),
            connection,
        )
        .unwrap();
    }

    fn summary(year: i32, month: u8, income: f64, expenses: f64) -> MonthlySummary {
        MonthlySummary {
            year,
            month,
            currency: CurrencyCode::new_unchecked("USD"),
            income,
            expenses,
            balance: income - expenses,
        }
    }

    #[test]
    fn fills_empty_months_with_zero() {
        let connection = get_test_connection();
        let calendar = Calendar::new("Etc/UTC").unwrap();
        insert(
            1000.0,
            TransactionKind::Income,
            Timestamp::from(datetime!(2025-01-05 09:00 UTC)),
            "USD",
            &connection,
        );
        insert(
            250.0,
            TransactionKind::Expense,
            Timestamp::from(datetime!(2025-03-10 09:00 UTC)),
            "USD",
            &connection,
        );
        insert(
            40.0,
            TransactionKind::Expense,
            Timestamp::from(datetime!(2025-03-12 09:00 UTC)),
            "USD",
            &connection,
        );

        let summaries = get_monthly_summaries(
            Timestamp::from(datetime!(2025-03-20 00:00 UTC)),
            4,
            &CurrencyCode::new_unchecked("USD"),
            &calendar,
            &connection,
        )
        .expect("Could not get summaries");

        assert_eq!(
            summaries,
            vec![
                summary(2024, 12, 0.0, 0.0),
                summary(2025, 1, 1000.0, 0.0),
                summary(2025, 2, 0.0, 0.0),
                summary(2025, 3, 0.0, 290.0),
            ]
        );
    }

    #[test]
    fn ignores_other_currencies() {
        let connection = get_test_connection();
        let calendar = Calendar::new("Etc/UTC").unwrap();
        let date = Timestamp::from(datetime!(2025-06-01 12:00 UTC));
        insert(10.0, TransactionKind::Expense, date, "USD", &connection);
        insert(99.0, TransactionKind::Expense, date, "EUR", &connection);

        let summaries = get_monthly_summaries(
            date,
            1,
            &CurrencyCode::new_unchecked("USD"),
            &calendar,
            &connection,
        )
        .unwrap();

        assert_eq!(summaries, vec![summary(2025, 6, 0.0, 10.0)]);
    }

    #[test]
    fn buckets_by_local_month() {
        let connection = get_test_connection();
        let calendar = Calendar::new("Pacific/Auckland").unwrap();
        // 1 July 2025 at 10am in Auckland, still June in UTC.
        insert(
            75.0,
            TransactionKind::Income,
            Timestamp::from(datetime!(2025-06-30 22:00 UTC)),
            "USD",
            &connection,
        );

        let summaries = get_monthly_summaries(
            Timestamp::from(datetime!(2025-07-15 00:00 UTC)),
            2,
            &CurrencyCode::new_unchecked("USD"),
            &calendar,
            &connection,
        )
        .unwrap();

        assert_eq!(
            summaries,
            vec![summary(2025, 6, 0.0, 0.0), summary(2025, 7, 75.0, 0.0)]
        );
    }

    #[test]
    fn zero_months_is_empty() {
        let connection = get_test_connection();

        let summaries = get_monthly_summaries(
            Timestamp::now(),
            0,
            &CurrencyCode::default(),
            &Calendar::new("Etc/UTC").unwrap(),
            &connection,
        );

        assert_eq!(summaries, Ok(vec![]));
    }

    #[test]
    fn crosses_year_boundaries() {
        let connection = get_test_connection();

        let summaries = get_monthly_summaries(
            Timestamp::from(datetime!(2025-02-10 00:00 UTC)),
            14,
            &CurrencyCode::new_unchecked("USD"),
            &Calendar::new("Etc/UTC").unwrap(),
            &connection,
        )
        .unwrap();

        assert_eq!(summaries.len(), 14);
        assert_eq!((summaries[0].year, summaries[0].month), (2024, 1));
        assert_eq!((summaries[13].year, summaries[13].month), (2025, 2));
    }

    #[test]
    fn allows_the_maximum_number_of_months() {
        let connection = get_test_connection();

        let summaries = get_monthly_summaries(
            Timestamp::from(datetime!(2025-02-10 00:00 UTC)),
            MAX_SUMMARY_MONTHS,
            &CurrencyCode::default(),
            &Calendar::new("Etc/UTC").unwrap(),
            &connection,
        )
        .unwrap();

        assert_eq!(summaries.len(), MAX_SUMMARY_MONTHS as usize);
        assert_eq!((summaries[0].year, summaries[0].month), (2015, 3));
    }

    #[test]
    fn rejects_more_than_the_maximum_number_of_months() {
        let connection = get_test_connection();

        let summaries = get_monthly_summaries(
            Timestamp::now(),
            u32::MAX,
            &CurrencyCode::default(),
            &Calendar::new("Etc/UTC").unwrap(),
            &connection,
        );

        assert_eq!(summaries, Err(Error::TooManyMonths(u32::MAX)));
    }
}
