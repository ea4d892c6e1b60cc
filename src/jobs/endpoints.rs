//! The route handlers that let an external scheduler trigger batch jobs.
//!
//! These are machine-to-machine endpoints: instead of a user's bearer token
//! they are guarded by the shared cron secret, sent in the `x-cron-secret`
//! header.

use axum::{Json, extract::State, http::HeaderMap};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    jobs::{JobOutcome, process_recurring_transactions, process_report_job},
};

/// The header that carries the shared cron secret.
const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// The response body of a manual job trigger.
#[derive(Debug, Serialize)]
pub struct JobTriggerResponse {
    /// Whether the run completed.
    pub success: bool,
    /// The per-record tally of the run.
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

/// A route handler that runs the recurring-transaction job on demand.
///
/// # Errors
/// Returns [Error::InvalidCredentials] if the cron secret header is missing
/// or wrong.
pub async fn trigger_recurring_job_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<JobTriggerResponse>, Error> {
    check_cron_secret(&headers, &state.cron_secret)?;

    // Serialize with scheduled runs of the same job.
    let _guard = state.job_locks.recurring.lock().await;
    let outcome =
        process_recurring_transactions(&state.db_connection, OffsetDateTime::now_utc())?;

    Ok(Json(JobTriggerResponse {
        success: true,
        outcome,
    }))
}

/// A route handler that runs the report-generation job on demand.
///
/// # Errors
/// Returns [Error::InvalidCredentials] if the cron secret header is missing
/// or wrong.
pub async fn trigger_report_job_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<JobTriggerResponse>, Error> {
    check_cron_secret(&headers, &state.cron_secret)?;

    let _guard = state.job_locks.reports.lock().await;
    let outcome = process_report_job(
        &state.db_connection,
        state.mailer.as_ref(),
        state.insight_generator.as_ref(),
        OffsetDateTime::now_utc(),
    )?;

    Ok(Json(JobTriggerResponse {
        success: true,
        outcome,
    }))
}

fn check_cron_secret(headers: &HeaderMap, expected: &str) -> Result<(), Error> {
    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(Error::InvalidCredentials)?;

    if provided != expected {
        return Err(Error::InvalidCredentials);
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod endpoint_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        AppState, endpoints,
        routing::build_router,
        transaction::{RecurringInterval, Transaction, TransactionType, create_transaction},
        user::create_user,
    };

    fn test_server() -> (TestServer, AppState) {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn, "foobar", "cron-secret").unwrap();
        let server =
            TestServer::new(build_router(state.clone()));

        (server, state)
    }

    #[tokio::test]
    async fn trigger_without_secret_is_unauthorized() {
        let (server, _) = test_server();

        server
            .post(endpoints::RECURRING_JOB)
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn trigger_with_wrong_secret_is_unauthorized() {
        let (server, _) = test_server();

        server
            .post(endpoints::REPORT_JOB)
            .add_header("x-cron-secret", "not-the-secret")
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn trigger_processes_due_transactions() {
        let (server, state) = test_server();

        {
            let connection = state.db_connection.lock().unwrap();
            let user = create_user("Test", "foo@bar.baz", "hash", &connection).unwrap();
            let yesterday = OffsetDateTime::now_utc().date() - Duration::days(1);
            create_transaction(
                Transaction::build(
                    user.id,
                    "Netflix",
                    TransactionType::Expense,
                    1_599,
                    "Entertainment",
                    yesterday - Duration::days(30),
                )
                .recurring(RecurringInterval::Monthly, yesterday),
                &connection,
            )
            .unwrap();
        }

        let body = server
            .post(endpoints::RECURRING_JOB)
            .add_header("x-cron-secret", "cron-secret")
            .await
            .json::<serde_json::Value>();

        assert_eq!(body["success"], true);
        assert_eq!(body["processedCount"], 1);
        assert_eq!(body["failedCount"], 0);
        assert_eq!(body["totalCount"], 1);
    }

    #[tokio::test]
    async fn report_trigger_with_no_due_settings_reports_zero() {
        let (server, _) = test_server();

        let body = server
            .post(endpoints::REPORT_JOB)
            .add_header("x-cron-secret", "cron-secret")
            .await
            .json::<serde_json::Value>();

        assert_eq!(body["success"], true);
        assert_eq!(body["totalCount"], 0);
    }
}
