//! Defines the report models and their database queries.
//!
//! A [ReportSetting] is the per-user schedule for emailed financial reports.
//! A [Report] is the append-only audit record of one report-job attempt; rows
//! are inserted once and never mutated afterward.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::DatabaseId,
    db::text_enum,
    user::{User, UserId, map_user_row_prefixed},
};

// ============================================================================
// MODELS
// ============================================================================

/// How often a user receives an emailed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ReportFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

/// The outcome recorded for one report-job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// The report email was delivered.
    Sent,
    /// The attempt has been recorded but not yet resolved.
    Pending,
    /// The report email could not be delivered.
    Failed,
    /// The period had no transactions, so no email was sent.
    NoActivity,
}

text_enum!(
    ReportFrequency,
    Error::InvalidFrequency,
    [
        (ReportFrequency::Daily, "DAILY"),
        (ReportFrequency::Weekly, "WEEKLY"),
        (ReportFrequency::Monthly, "MONTHLY"),
        (ReportFrequency::Quarterly, "QUARTERLY"),
        (ReportFrequency::Annually, "ANNUALLY"),
    ]
);

text_enum!(
    ReportStatus,
    Error::InvalidFieldValue,
    [
        (ReportStatus::Sent, "SENT"),
        (ReportStatus::Pending, "PENDING"),
        (ReportStatus::Failed, "FAILED"),
        (ReportStatus::NoActivity, "NO_ACTIVITY"),
    ]
);

/// A user's report schedule. One row per user.
///
/// When `is_enabled` is false the report job ignores the row entirely;
/// `next_report_date` only matters for scheduling while enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSetting {
    /// The ID of the setting row.
    pub id: DatabaseId,
    /// The ID of the user the schedule belongs to.
    pub user_id: UserId,
    /// How often to send reports.
    pub frequency: ReportFrequency,
    /// Whether the user receives reports at all.
    pub is_enabled: bool,
    /// When a report was last successfully sent, if ever.
    pub last_sent_date: Option<OffsetDateTime>,
    /// The next date the report job should act on this setting.
    pub next_report_date: Option<Date>,
}

/// The audit record of one report-job attempt for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// The ID of the report row.
    pub id: DatabaseId,
    /// The ID of the user the report was for.
    pub user_id: UserId,
    /// Human-readable label of the period the report covered.
    pub period: String,
    /// When the attempt happened.
    pub sent_date: OffsetDateTime,
    /// The outcome of the attempt.
    pub status: ReportStatus,
}

/// The fields a settings update is allowed to change.
///
/// Named explicitly so an update can never clobber unrelated columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettingUpdate {
    /// The new frequency.
    pub frequency: ReportFrequency,
    /// Whether reports are enabled.
    pub is_enabled: bool,
    /// The recomputed next report date; `None` disables scheduling.
    pub next_report_date: Option<Date>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const SETTING_COLUMNS: &str =
    "id, user_id, frequency, is_enabled, last_sent_date, next_report_date";

/// Create the report setting and report tables in the database.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn create_report_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS report_setting (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                frequency TEXT NOT NULL,
                is_enabled INTEGER NOT NULL DEFAULT 1,
                last_sent_date TEXT,
                next_report_date TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS report (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                period TEXT NOT NULL,
                sent_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    // Index used by the report job's due-settings query.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_report_setting_due
             ON report_setting(is_enabled, next_report_date);",
        (),
    )?;

    Ok(())
}

/// Create a report setting for a newly registered user: monthly, enabled,
/// never sent.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error, e.g. the user
/// already has a setting row.
pub fn create_default_report_setting(
    user_id: UserId,
    next_report_date: Date,
    connection: &Connection,
) -> Result<ReportSetting, Error> {
    let setting = connection
        .prepare(&format!(
            "INSERT INTO report_setting (user_id, frequency, is_enabled, last_sent_date, next_report_date)
             VALUES (?1, ?2, 1, NULL, ?3)
             RETURNING {SETTING_COLUMNS}"
        ))?
        .query_row(
            (user_id, ReportFrequency::Monthly, next_report_date),
            map_setting_row,
        )?;

    Ok(setting)
}

/// Retrieve a user's report setting.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the user has no setting row,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_report_setting(user_id: UserId, connection: &Connection) -> Result<ReportSetting, Error> {
    let setting = connection
        .prepare(&format!(
            "SELECT {SETTING_COLUMNS} FROM report_setting WHERE user_id = :user_id"
        ))?
        .query_row(&[(":user_id", &user_id)], map_setting_row)?;

    Ok(setting)
}

/// Apply a [ReportSettingUpdate] to a user's setting row.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no setting row.
pub fn update_report_setting(
    user_id: UserId,
    update: ReportSettingUpdate,
    connection: &Connection,
) -> Result<ReportSetting, Error> {
    let setting = connection
        .prepare(&format!(
            "UPDATE report_setting
             SET frequency = ?1, is_enabled = ?2, next_report_date = ?3
             WHERE user_id = ?4
             RETURNING {SETTING_COLUMNS}"
        ))?
        .query_row(
            (
                update.frequency,
                update.is_enabled,
                update.next_report_date,
                user_id,
            ),
            map_setting_row,
        )?;

    Ok(setting)
}

/// Find the enabled report settings due on or before `today`, joined with
/// their owners.
///
/// The result is a point-in-time snapshot; see
/// [find_due_recurring](crate::transaction::find_due_recurring) for the
/// rationale.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn find_due_settings(
    today: Date,
    connection: &Connection,
) -> Result<Vec<(ReportSetting, User)>, Error> {
    let rows = connection
        .prepare(&format!(
            "SELECT s.id, s.user_id, s.frequency, s.is_enabled, s.last_sent_date,
                    s.next_report_date,
                    u.id, u.name, u.email, u.password_hash, u.created_at
             FROM report_setting s
             JOIN user u ON u.id = s.user_id
             WHERE s.is_enabled = 1 AND s.next_report_date <= :today
             ORDER BY s.id"
        ))?
        .query_map(&[(":today", &today)], |row| {
            Ok((map_setting_row(row)?, map_user_row_prefixed(row, 6)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Insert one append-only report audit row.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn insert_report(
    user_id: UserId,
    period: &str,
    sent_date: OffsetDateTime,
    status: ReportStatus,
    connection: &Connection,
) -> Result<Report, Error> {
    let report = connection
        .prepare(
            "INSERT INTO report (user_id, period, sent_date, status)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, user_id, period, sent_date, status",
        )?
        .query_row((user_id, period, sent_date, status), map_report_row)?;

    Ok(report)
}

/// Advance a setting's schedule after a report-job attempt.
///
/// `last_sent_date` is `Some(now)` only when the email was delivered; other
/// outcomes clear it. `next_report_date` always moves forward so a failing
/// recipient never stalls the schedule.
///
/// # Errors
/// Returns [Error::NotFound] if the setting row vanished since the
/// due-settings query, so the caller can roll back its atomic scope.
pub fn update_setting_after_run(
    user_id: UserId,
    last_sent_date: Option<OffsetDateTime>,
    next_report_date: Date,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_updated = connection.execute(
        "UPDATE report_setting
         SET last_sent_date = ?1, next_report_date = ?2
         WHERE user_id = ?3",
        (last_sent_date, next_report_date, user_id),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// List a page of a user's report history, most recent first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn list_reports(
    user_id: UserId,
    page_number: u64,
    page_size: u64,
    connection: &Connection,
) -> Result<Vec<Report>, Error> {
    let offset = (page_number.max(1) - 1) * page_size;

    let reports = connection
        .prepare(
            "SELECT id, user_id, period, sent_date, status FROM report
             WHERE user_id = :user_id
             ORDER BY sent_date DESC, id DESC
             LIMIT :limit OFFSET :offset",
        )?
        .query_map(
            &[
                (":user_id", &user_id),
                (":limit", &(page_size as i64)),
                (":offset", &(offset as i64)),
            ],
            map_report_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(reports)
}

/// Count a user's report history rows.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn count_reports(user_id: UserId, connection: &Connection) -> Result<u64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM report WHERE user_id = :user_id",
            &[(":user_id", &user_id)],
            |row| row.get::<_, i64>(0).map(|count| count as u64),
        )
        .map_err(|error| error.into())
}

fn map_setting_row(row: &Row) -> Result<ReportSetting, rusqlite::Error> {
    Ok(ReportSetting {
        id: row.get(0)?,
        user_id: row.get(1)?,
        frequency: row.get(2)?,
        is_enabled: row.get(3)?,
        last_sent_date: row.get(4)?,
        next_report_date: row.get(5)?,
    })
}

fn map_report_row(row: &Row) -> Result<Report, rusqlite::Error> {
    Ok(Report {
        id: row.get(0)?,
        user_id: row.get(1)?,
        period: row.get(2)?,
        sent_date: row.get(3)?,
        status: row.get(4)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{Error, db::initialize, user::create_user};

    use super::{
        ReportFrequency, ReportSetting, ReportSettingUpdate, ReportStatus,
        create_default_report_setting, find_due_settings, get_report_setting, insert_report,
        list_reports, update_report_setting, update_setting_after_run,
    };

    fn get_test_connection() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("Test", "foo@bar.baz", "hash", &conn).unwrap();

        (conn, user.id)
    }

    fn default_setting(conn: &Connection, user_id: i64) -> ReportSetting {
        create_default_report_setting(user_id, date!(2024 - 02 - 01), conn).unwrap()
    }

    #[test]
    fn default_setting_is_monthly_and_enabled() {
        let (conn, user_id) = get_test_connection();

        let setting = default_setting(&conn, user_id);

        assert_eq!(setting.frequency, ReportFrequency::Monthly);
        assert!(setting.is_enabled);
        assert_eq!(setting.last_sent_date, None);
        assert_eq!(setting.next_report_date, Some(date!(2024 - 02 - 01)));
    }

    #[test]
    fn update_changes_only_named_fields() {
        let (conn, user_id) = get_test_connection();
        default_setting(&conn, user_id);

        let updated = update_report_setting(
            user_id,
            ReportSettingUpdate {
                frequency: ReportFrequency::Weekly,
                is_enabled: false,
                next_report_date: None,
            },
            &conn,
        )
        .unwrap();

        assert_eq!(updated.frequency, ReportFrequency::Weekly);
        assert!(!updated.is_enabled);
        assert_eq!(updated.next_report_date, None);
        // Untouched by the update struct.
        assert_eq!(updated.last_sent_date, None);
    }

    #[test]
    fn disabled_settings_are_never_due() {
        let (conn, user_id) = get_test_connection();
        default_setting(&conn, user_id);
        update_report_setting(
            user_id,
            ReportSettingUpdate {
                frequency: ReportFrequency::Monthly,
                is_enabled: false,
                next_report_date: Some(date!(2024 - 02 - 01)),
            },
            &conn,
        )
        .unwrap();

        let due = find_due_settings(date!(2024 - 06 - 01), &conn).unwrap();

        assert!(due.is_empty());
    }

    #[test]
    fn due_settings_include_their_owner() {
        let (conn, user_id) = get_test_connection();
        default_setting(&conn, user_id);

        let due = find_due_settings(date!(2024 - 02 - 02), &conn).unwrap();

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0.user_id, user_id);
        assert_eq!(due[0].1.email, "foo@bar.baz");
    }

    #[test]
    fn after_run_update_always_advances_schedule() {
        let (conn, user_id) = get_test_connection();
        default_setting(&conn, user_id);

        update_setting_after_run(user_id, None, date!(2024 - 03 - 01), &conn).unwrap();

        let setting = get_report_setting(user_id, &conn).unwrap();
        assert_eq!(setting.last_sent_date, None);
        assert_eq!(setting.next_report_date, Some(date!(2024 - 03 - 01)));
    }

    #[test]
    fn after_run_update_for_missing_setting_is_not_found() {
        let (conn, _) = get_test_connection();

        let result = update_setting_after_run(999, None, date!(2024 - 03 - 01), &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn reports_list_most_recent_first() {
        let (conn, user_id) = get_test_connection();
        let now = time::OffsetDateTime::now_utc();
        insert_report(user_id, "Jan 1 - 31, 2024", now, ReportStatus::Sent, &conn).unwrap();
        insert_report(
            user_id,
            "Feb 1 - 29, 2024",
            now + time::Duration::days(31),
            ReportStatus::NoActivity,
            &conn,
        )
        .unwrap();

        let reports = list_reports(user_id, 1, 20, &conn).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].period, "Feb 1 - 29, 2024");
        assert_eq!(reports[0].status, ReportStatus::NoActivity);
    }
}
