//! The API endpoint URIs.

/// The health-check route.
pub const ROOT: &str = "/";
/// The route for registering a user.
pub const USERS: &str = "/api/users";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/auth/login";
/// The route for fetching the authenticated user.
pub const USER_ME: &str = "/api/users/me";
/// The route to access transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route for deleting several transactions at once.
pub const TRANSACTIONS_BULK_DELETE: &str = "/api/transactions/bulk-delete";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route for copying a transaction.
pub const TRANSACTION_DUPLICATE: &str = "/api/transactions/{transaction_id}/duplicate";
/// The route to list the report history.
pub const REPORTS: &str = "/api/reports";
/// The route to access the report schedule setting.
pub const REPORT_SETTING: &str = "/api/reports/setting";
/// The route for the analytics summary.
pub const ANALYTICS_SUMMARY: &str = "/api/analytics/summary";
/// The route for manually triggering the recurring-transaction job.
pub const RECURRING_JOB: &str = "/api/jobs/transactions";
/// The route for manually triggering the report job.
pub const REPORT_JOB: &str = "/api/jobs/reports";

// These tests are here so that we know the routes will not panic when the
// router is built.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::ROOT);
        assert_endpoint_is_valid_uri(endpoints::USERS);
        assert_endpoint_is_valid_uri(endpoints::LOG_IN);
        assert_endpoint_is_valid_uri(endpoints::USER_ME);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS_BULK_DELETE);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTION_DUPLICATE);
        assert_endpoint_is_valid_uri(endpoints::REPORTS);
        assert_endpoint_is_valid_uri(endpoints::REPORT_SETTING);
        assert_endpoint_is_valid_uri(endpoints::ANALYTICS_SUMMARY);
        assert_endpoint_is_valid_uri(endpoints::RECURRING_JOB);
        assert_endpoint_is_valid_uri(endpoints::REPORT_JOB);
    }
}
