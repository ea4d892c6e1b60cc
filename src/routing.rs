//! Application router configuration.

use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use serde_json::json;

use crate::{
    AppState,
    analytics::get_analytics_summary_endpoint,
    endpoints,
    jobs::{trigger_recurring_job_endpoint, trigger_report_job_endpoint},
    log_in::log_in,
    register_user::register_user,
    report::{get_report_setting_endpoint, get_reports_endpoint, update_report_setting_endpoint},
    transaction::{
        bulk_delete_transactions_endpoint, create_transaction_endpoint,
        delete_transaction_endpoint, duplicate_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, update_transaction_endpoint,
    },
    user::get_current_user_endpoint,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(health_check))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::USER_ME, get(get_current_user_endpoint))
        .route(endpoints::LOG_IN, post(log_in))
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_BULK_DELETE,
            delete(bulk_delete_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(endpoints::TRANSACTION_DUPLICATE, post(duplicate_transaction_endpoint))
        .route(endpoints::REPORTS, get(get_reports_endpoint))
        .route(
            endpoints::REPORT_SETTING,
            get(get_report_setting_endpoint).put(update_report_setting_endpoint),
        )
        .route(endpoints::ANALYTICS_SUMMARY, get(get_analytics_summary_endpoint))
        .route(endpoints::RECURRING_JOB, post(trigger_recurring_job_endpoint))
        .route(endpoints::REPORT_JOB, post(trigger_report_job_endpoint))
        .with_state(state)
}

/// Report that the server is up.
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
