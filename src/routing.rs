//! Application router configuration.

use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};

use crate::{
    AppState, Error,
    category::{create_category_endpoint, delete_category_endpoint, get_categories_endpoint},
    endpoints,
    recurring::{
        catch_up_endpoint, create_recurring_rule_endpoint, delete_recurring_rule_endpoint,
        get_recurring_rules_endpoint,
    },
    summary::get_summary_endpoint,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(endpoints::CATEGORY, delete(delete_category_endpoint))
        .route(
            endpoints::RECURRING_RULES,
            get(get_recurring_rules_endpoint).post(create_recurring_rule_endpoint),
        )
        .route(
            endpoints::RECURRING_RULE,
            delete(delete_recurring_rule_endpoint),
        )
        .route(endpoints::CATCH_UP, post(catch_up_endpoint))
        .route(endpoints::SUMMARY, get(get_summary_endpoint))
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
