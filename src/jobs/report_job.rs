//! The batch job that generates and emails due financial reports.

use std::sync::Mutex;

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    insights::InsightGenerator,
    jobs::{JobOutcome, next_report_date, report_period_window},
    mailer::ReportMailer,
    report::{
        ReportSetting, ReportStatus, financial_summary, find_due_settings, insert_report,
        period_label, render_report_email, update_setting_after_run,
    },
    user::User,
};

/// Process every enabled report setting that is due at `now`.
///
/// For each due setting, the user's activity in the frequency's period window
/// is summarized, decorated with insights, and emailed. One audit row is
/// inserted per attempt, including no-activity periods and delivery failures,
/// and the setting's schedule always moves forward so one failing recipient
/// cannot stall itself or the run. The audit insert and schedule update are
/// atomic per setting.
///
/// The database lock is held for the whole run, including delivery, so route
/// handlers queue behind it until the job finishes. [ReportMailer]
/// implementations should hand the message off quickly rather than block on a
/// remote transport.
///
/// # Errors
/// Returns an error only if the due-settings query itself fails; per-setting
/// failures are tallied in the returned [JobOutcome] instead.
pub fn process_report_job(
    db_connection: &Mutex<Connection>,
    mailer: &dyn ReportMailer,
    insight_generator: &dyn InsightGenerator,
    now: OffsetDateTime,
) -> Result<JobOutcome, Error> {
    let connection = db_connection.lock().map_err(|_| Error::DatabaseLockError)?;

    let due = find_due_settings(now.date(), &connection)?;
    tracing::info!("Starting report generation");

    let outcome = process_due_settings(&due, mailer, insight_generator, now, &connection);

    tracing::info!(
        "Processed {} reports out of {}.",
        outcome.processed,
        outcome.total
    );
    tracing::info!("Failed {} reports out of {}.", outcome.failed, outcome.total);

    Ok(outcome)
}

/// Run the per-setting step for a snapshot of due settings.
fn process_due_settings(
    due: &[(ReportSetting, User)],
    mailer: &dyn ReportMailer,
    insight_generator: &dyn InsightGenerator,
    now: OffsetDateTime,
    connection: &Connection,
) -> JobOutcome {
    let mut outcome = JobOutcome::default();

    for (setting, user) in due {
        outcome.total += 1;

        match generate_report(setting, user, mailer, insight_generator, now, connection) {
            Ok(status) => {
                outcome.processed += 1;
                tracing::info!("Report for {}: {}", user.email, status);
            }
            Err(error) => {
                outcome.failed += 1;
                tracing::error!("Failed report for {}: {}", user.email, error);
            }
        }
    }

    outcome
}

/// Generate, attempt delivery of, and record one user's report.
///
/// Delivery failure is a recorded outcome, not an error: the audit row gets
/// [ReportStatus::Failed] and the schedule still advances. An error here means
/// the database writes themselves failed and were rolled back, leaving the
/// setting due for the next run.
fn generate_report(
    setting: &ReportSetting,
    user: &User,
    mailer: &dyn ReportMailer,
    insight_generator: &dyn InsightGenerator,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<ReportStatus, Error> {
    let window = report_period_window(setting.frequency, now.date());

    let (period, status) = match financial_summary(user.id, &window, connection)? {
        Some(mut summary) => {
            summary.insights = insight_generator.summarize(&summary);
            let email = render_report_email(&user.email, &user.name, setting.frequency, &summary);

            let status = match mailer.send(&email) {
                Ok(()) => ReportStatus::Sent,
                Err(error) => {
                    tracing::warn!("Could not deliver report to {}: {}", user.email, error);
                    ReportStatus::Failed
                }
            };

            (summary.period, status)
        }
        None => (period_label(&window), ReportStatus::NoActivity),
    };

    let last_sent_date = (status == ReportStatus::Sent).then_some(now);
    let next_date = next_report_date(setting.frequency, now.date());

    let transaction = connection.unchecked_transaction()?;
    insert_report(user.id, &period, now, status, &transaction)?;
    update_setting_after_run(user.id, last_sent_date, next_date, &transaction)?;
    transaction.commit()?;

    Ok(status)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod report_job_tests {
    use std::sync::Mutex;

    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        db::initialize,
        insights::HeuristicInsights,
        mailer::test_doubles::{FailingMailer, RecordingMailer},
        report::{
            ReportStatus, create_default_report_setting, count_reports, get_report_setting,
            list_reports,
        },
        transaction::{Transaction, TransactionType, create_transaction},
        user::{User, create_user},
    };

    use super::{process_due_settings, process_report_job};

    fn get_test_connection() -> (Connection, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("Test", "foo@bar.baz", "hash", &conn).unwrap();

        (conn, user)
    }

    fn add_february_activity(conn: &Connection, user_id: i64) {
        create_transaction(
            Transaction::build(
                user_id,
                "Salary",
                TransactionType::Income,
                500_000,
                "Salary",
                date!(2024 - 02 - 05),
            ),
            conn,
        )
        .unwrap();
        create_transaction(
            Transaction::build(
                user_id,
                "Rent",
                TransactionType::Expense,
                180_000,
                "Housing",
                date!(2024 - 02 - 01),
            ),
            conn,
        )
        .unwrap();
    }

    #[test]
    fn active_period_sends_email_and_records_sent() {
        let (conn, user) = get_test_connection();
        create_default_report_setting(user.id, date!(2024 - 03 - 01), &conn).unwrap();
        add_february_activity(&conn, user.id);
        let mailer = RecordingMailer::default();
        let now = datetime!(2024-03-01 08:00 UTC);

        let db_connection = Mutex::new(conn);
        let outcome =
            process_report_job(&db_connection, &mailer, &HeuristicInsights, now).unwrap();

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.failed, 0);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "foo@bar.baz");
        assert!(sent[0].subject.starts_with("MONTHLY Financial Report"));

        let conn = db_connection.into_inner().unwrap();
        let reports = list_reports(user.id, 1, 20, &conn).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, ReportStatus::Sent);
        assert_eq!(reports[0].period, "Feb 1 - 29, 2024");

        let setting = get_report_setting(user.id, &conn).unwrap();
        assert_eq!(setting.last_sent_date, Some(now));
        assert_eq!(setting.next_report_date, Some(date!(2024 - 04 - 01)));
    }

    #[test]
    fn quiet_period_records_no_activity_without_emailing() {
        let (conn, user) = get_test_connection();
        create_default_report_setting(user.id, date!(2024 - 03 - 01), &conn).unwrap();
        let mailer = RecordingMailer::default();
        let now = datetime!(2024-03-01 08:00 UTC);

        let db_connection = Mutex::new(conn);
        let outcome =
            process_report_job(&db_connection, &mailer, &HeuristicInsights, now).unwrap();

        assert_eq!(outcome.processed, 1);
        assert!(mailer.sent.lock().unwrap().is_empty());

        let conn = db_connection.into_inner().unwrap();
        let reports = list_reports(user.id, 1, 20, &conn).unwrap();
        assert_eq!(reports[0].status, ReportStatus::NoActivity);

        let setting = get_report_setting(user.id, &conn).unwrap();
        assert_eq!(setting.last_sent_date, None);
        assert_eq!(setting.next_report_date, Some(date!(2024 - 04 - 01)));
    }

    #[test]
    fn delivery_failure_is_recorded_and_schedule_still_advances() {
        let (conn, user) = get_test_connection();
        create_default_report_setting(user.id, date!(2024 - 03 - 01), &conn).unwrap();
        add_february_activity(&conn, user.id);
        let now = datetime!(2024-03-01 08:00 UTC);

        let db_connection = Mutex::new(conn);
        let outcome =
            process_report_job(&db_connection, &FailingMailer, &HeuristicInsights, now).unwrap();

        // A failed delivery is still a processed setting.
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.failed, 0);

        let conn = db_connection.into_inner().unwrap();
        let reports = list_reports(user.id, 1, 20, &conn).unwrap();
        assert_eq!(reports[0].status, ReportStatus::Failed);

        let setting = get_report_setting(user.id, &conn).unwrap();
        assert_eq!(setting.last_sent_date, None);
        assert_eq!(setting.next_report_date, Some(date!(2024 - 04 - 01)));
    }

    #[test]
    fn settings_not_yet_due_are_untouched() {
        let (conn, user) = get_test_connection();
        create_default_report_setting(user.id, date!(2024 - 03 - 01), &conn).unwrap();
        let mailer = RecordingMailer::default();
        let now = datetime!(2024-02-15 08:00 UTC);

        let outcome =
            process_report_job(&Mutex::new(conn), &mailer, &HeuristicInsights, now).unwrap();

        assert_eq!(outcome.total, 0);
    }

    #[test]
    fn vanished_setting_rolls_back_the_audit_row() {
        let (conn, user) = get_test_connection();
        let setting = create_default_report_setting(user.id, date!(2024 - 03 - 01), &conn).unwrap();
        add_february_activity(&conn, user.id);
        let now = datetime!(2024-03-01 08:00 UTC);

        // The setting row disappears between the due-settings query and
        // processing.
        conn.execute("DELETE FROM report_setting WHERE id = ?1", (setting.id,))
            .unwrap();
        let mailer = RecordingMailer::default();

        let outcome = process_due_settings(
            &[(setting, user.clone())],
            &mailer,
            &HeuristicInsights,
            now,
            &conn,
        );

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.processed, 0);
        // The atomic scope rolled back the audit row too.
        assert_eq!(count_reports(user.id, &conn).unwrap(), 0);
    }
}
