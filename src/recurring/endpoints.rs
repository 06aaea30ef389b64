//! Route handlers for recurring rules and the manual catch-up trigger.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Calendar, CurrencyCode, Error, RecurringRuleId, Timestamp,
    category::CategoryName,
    recurring::{
        db::{delete_recurring_rule, get_all_recurring_rules},
        models::{Frequency, RecurringRuleDetails},
        runner::{CatchUpRunner, create_recurring_rule},
    },
    transaction::{TransactionKind, validate_amount},
};

/// The state needed for the recurring rule endpoints.
#[derive(Debug, Clone)]
pub struct RecurringState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub calendar: Calendar,
    pub default_currency: CurrencyCode,
    /// How many occurrences to create when a rule is added.
    pub lookahead_count: u32,
    pub catch_up: CatchUpRunner,
}

impl FromRef<AppState> for RecurringState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            calendar: state.calendar.clone(),
            default_currency: state.default_currency.clone(),
            lookahead_count: state.lookahead_count,
            catch_up: state.catch_up.clone(),
        }
    }
}

/// The request body for creating a recurring rule.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecurringRuleForm {
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    /// Either "weekly" or "monthly".
    pub frequency: String,
    /// The date of the first occurrence, defaults to now.
    pub start_date: Option<Timestamp>,
    pub note: Option<String>,
    pub currency: Option<String>,
}

impl RecurringRuleForm {
    fn into_details(
        self,
        default_currency: &CurrencyCode,
    ) -> Result<(RecurringRuleDetails, Timestamp), Error> {
        let amount = validate_amount(self.amount)?;
        let category = CategoryName::new(&self.category)?;
        let frequency: Frequency = self.frequency.trim().to_lowercase().parse()?;
        let currency = match self.currency {
            Some(code) => CurrencyCode::new(&code)?,
            None => default_currency.clone(),
        };

        let details = RecurringRuleDetails {
            amount,
            kind: self.kind,
            category,
            frequency,
            note: self.note.filter(|note| !note.trim().is_empty()),
            currency,
        };

        Ok((details, self.start_date.unwrap_or_else(Timestamp::now)))
    }
}

/// A route handler for listing recurring rules, soonest due first.
///
/// Rules that cannot be read are left out and logged.
pub async fn get_recurring_rules_endpoint(State(state): State<RecurringState>) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let rules = match get_all_recurring_rules(&connection) {
        Ok(rules) => rules,
        Err(error) => return error.into_response(),
    };

    let rules: Vec<_> = rules
        .into_iter()
        .filter_map(|rule| {
            rule.inspect_err(|error| tracing::warn!("Not listing recurring rule: {error}"))
                .ok()
        })
        .collect();

    Json(rules).into_response()
}

/// A route handler for creating a recurring rule along with its look-ahead transactions.
pub async fn create_recurring_rule_endpoint(
    State(state): State<RecurringState>,
    Json(form): Json<RecurringRuleForm>,
) -> Response {
    let (details, start) = match form.into_details(&state.default_currency) {
        Ok(parsed) => parsed,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_recurring_rule(
        details,
        start,
        state.lookahead_count,
        &state.calendar,
        &connection,
    ) {
        Ok(created) => {
            tracing::info!(
                "Created recurring rule {} with {} transaction(s)",
                created.rule.id,
                created.transactions.len()
            );
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(error) => {
            tracing::error!("Could not create recurring rule: {error}");
            error.into_response()
        }
    }
}

/// A route handler for deleting a recurring rule.
///
/// Transactions the rule already generated are kept.
pub async fn delete_recurring_rule_endpoint(
    Path(rule_id): Path<RecurringRuleId>,
    State(state): State<RecurringState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_recurring_rule(rule_id, &connection) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(Error::DeleteMissingRule) => Error::DeleteMissingRule.into_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting recurring rule {rule_id}: {error}"
            );
            error.into_response()
        }
    }
}

/// A route handler that runs a catch-up pass immediately.
pub async fn catch_up_endpoint(State(state): State<RecurringState>) -> Response {
    match state.catch_up.run(Timestamp::now()) {
        Ok(report) => Json(report).into_response(),
        Err(error) => error.into_response(),
    }
}
