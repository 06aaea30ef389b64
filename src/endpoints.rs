//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/recurring/{rule_id}', use [format_endpoint].

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to delete a category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// The route to list and create recurring rules.
pub const RECURRING_RULES: &str = "/api/recurring";
/// The route to delete a recurring rule.
pub const RECURRING_RULE: &str = "/api/recurring/{rule_id}";
/// The route to materialize due recurring rules immediately.
pub const CATCH_UP: &str = "/api/recurring/catch_up";
/// The route for monthly totals.
pub const SUMMARY: &str = "/api/summary";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::TRANSACTION, 1));
        assert_endpoint_is_valid_uri(endpoints::CATEGORIES);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::CATEGORY, 1));
        assert_endpoint_is_valid_uri(endpoints::RECURRING_RULES);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::RECURRING_RULE, 1));
        assert_endpoint_is_valid_uri(endpoints::CATCH_UP);
        assert_endpoint_is_valid_uri(endpoints::SUMMARY);
    }

    #[test]
    fn replaces_parameter() {
        assert_eq!(format_endpoint("/hello/{world_id}", 1), "/hello/1");
        assert_eq!(format_endpoint("/hello/{world}/bye", 2), "/hello/2/bye");
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        assert_eq!(format_endpoint("/hello/world", 1), "/hello/world");
    }
}
