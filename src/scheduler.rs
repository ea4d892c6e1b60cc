//! Drives the batch jobs on their UTC schedules.
//!
//! The recurring-transaction job runs daily at midnight UTC; the report job
//! runs at midnight UTC on the first of each month. Both jobs are also
//! triggerable over HTTP, so each holds a per-job lock while running to keep
//! scheduled and manual runs from overlapping.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::{
    AppState,
    jobs::{add_months, process_recurring_transactions, process_report_job, start_of_month},
};

/// The per-job mutexes shared between the scheduler and the trigger endpoints.
#[derive(Debug, Clone, Default)]
pub struct JobLocks {
    /// Held while the recurring-transaction job runs.
    pub(crate) recurring: Arc<tokio::sync::Mutex<()>>,
    /// Held while the report job runs.
    pub(crate) reports: Arc<tokio::sync::Mutex<()>>,
}

/// Spawn the background tasks that run the batch jobs on schedule.
///
/// The returned handles can be awaited or aborted by the caller; the tasks
/// themselves loop until the process shuts down.
pub fn start(state: &AppState) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(run_daily(state.clone())),
        tokio::spawn(run_monthly(state.clone())),
    ]
}

async fn run_daily(state: AppState) {
    loop {
        sleep_until(next_daily_run(OffsetDateTime::now_utc())).await;
        run_recurring_job(&state).await;
    }
}

async fn run_monthly(state: AppState) {
    loop {
        sleep_until(next_monthly_run(OffsetDateTime::now_utc())).await;
        run_report_job(&state).await;
    }
}

/// Run the recurring-transaction job once, holding its lock.
///
/// Job errors are logged, not propagated: a failed run must not kill the
/// scheduler task.
pub async fn run_recurring_job(state: &AppState) {
    let _guard = state.job_locks.recurring.lock().await;

    if let Err(error) =
        process_recurring_transactions(&state.db_connection, OffsetDateTime::now_utc())
    {
        tracing::error!("Scheduled recurring-transaction job failed: {error}");
    }
}

/// Run the report job once, holding its lock.
pub async fn run_report_job(state: &AppState) {
    let _guard = state.job_locks.reports.lock().await;

    if let Err(error) = process_report_job(
        &state.db_connection,
        state.mailer.as_ref(),
        state.insight_generator.as_ref(),
        OffsetDateTime::now_utc(),
    ) {
        tracing::error!("Scheduled report job failed: {error}");
    }
}

async fn sleep_until(target: OffsetDateTime) {
    let wait = (target - OffsetDateTime::now_utc())
        .try_into()
        .unwrap_or(std::time::Duration::ZERO);

    tokio::time::sleep(wait).await;
}

/// The next midnight UTC strictly after `now`.
fn next_daily_run(now: OffsetDateTime) -> OffsetDateTime {
    (now.date() + time::Duration::days(1)).midnight().assume_utc()
}

/// The next first-of-month midnight UTC strictly after `now`.
fn next_monthly_run(now: OffsetDateTime) -> OffsetDateTime {
    add_months(start_of_month(now.date()), 1).midnight().assume_utc()
}
