//! The route handlers for report history and the report schedule setting.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::Claims,
    jobs::next_report_date,
    pagination::{Paginated, PaginationQuery},
    report::{
        Report, ReportFrequency, ReportSetting, ReportSettingUpdate, count_reports,
        get_report_setting, list_reports, update_report_setting,
    },
};

/// A route handler for listing a page of the user's report history, most
/// recent first.
///
/// # Errors
/// Returns an error if there is an unexpected SQL error.
pub async fn get_reports_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<Report>>, Error> {
    let pagination = pagination.clamped();

    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let reports = list_reports(
        claims.user_id,
        pagination.page,
        pagination.page_size,
        &connection,
    )?;
    let total = count_reports(claims.user_id, &connection)?;

    Ok(Json(Paginated::new(reports, pagination, total)))
}

/// A route handler for fetching the user's report schedule setting.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no setting row.
pub async fn get_report_setting_endpoint(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<ReportSetting>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let setting = get_report_setting(claims.user_id, &connection)?;

    Ok(Json(setting))
}

/// The request body for updating the report schedule setting.
#[derive(Debug, Deserialize)]
pub struct UpdateReportSetting {
    /// How often to send reports.
    pub frequency: ReportFrequency,
    /// Whether the user receives reports at all.
    pub is_enabled: bool,
}

/// A route handler for updating the user's report schedule setting.
///
/// The next report date is recomputed server-side. Disabling clears it. When
/// enabled, a still-future date under an unchanged frequency is kept so
/// toggling unrelated fields does not push the schedule out; otherwise the
/// date is derived from the last successful send, or from today for users who
/// have never been sent a report.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no setting row.
pub async fn update_report_setting_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<UpdateReportSetting>,
) -> Result<Json<ReportSetting>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let current = get_report_setting(claims.user_id, &connection)?;

    let today = OffsetDateTime::now_utc().date();
    let next_report_date = if !request.is_enabled {
        None
    } else {
        match current.next_report_date {
            Some(date) if date > today && request.frequency == current.frequency => Some(date),
            _ => {
                let from = current
                    .last_sent_date
                    .map(|sent| sent.date())
                    .unwrap_or(today);

                Some(next_report_date(request.frequency, from))
            }
        }
    };

    let setting = update_report_setting(
        claims.user_id,
        ReportSettingUpdate {
            frequency: request.frequency,
            is_enabled: request.is_enabled,
            next_report_date,
        },
        &connection,
    )?;

    Ok(Json(setting))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod endpoint_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;
    use time::{Duration, OffsetDateTime, macros::date};

    use crate::{
        AppState,
        auth::encode_jwt,
        endpoints,
        report::{ReportSetting, ReportStatus, create_default_report_setting, insert_report},
        user::create_user,
    };

    fn test_server() -> (TestServer, AppState, String, i64) {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn, "foobar", "cron-secret").unwrap();

        let user = {
            let connection = state.db_connection.lock().unwrap();
            let user = create_user("Test", "foo@bar.baz", "hash", &connection).unwrap();
            create_default_report_setting(user.id, date!(2024 - 02 - 01), &connection).unwrap();
            user
        };
        let token = encode_jwt(user.id, &state.jwt_keys).unwrap();

        let server =
            TestServer::new(crate::routing::build_router(state.clone()));

        (server, state, token, user.id)
    }

    #[tokio::test]
    async fn setting_round_trip() {
        let (server, _, token, _) = test_server();

        let setting = server
            .get(endpoints::REPORT_SETTING)
            .authorization_bearer(&token)
            .await
            .json::<ReportSetting>();

        assert!(setting.is_enabled);
        assert_eq!(setting.next_report_date, Some(date!(2024 - 02 - 01)));
    }

    #[tokio::test]
    async fn disabling_clears_the_next_report_date() {
        let (server, _, token, _) = test_server();

        let setting = server
            .put(endpoints::REPORT_SETTING)
            .authorization_bearer(&token)
            .json(&json!({ "frequency": "MONTHLY", "is_enabled": false }))
            .await
            .json::<ReportSetting>();

        assert!(!setting.is_enabled);
        assert_eq!(setting.next_report_date, None);
    }

    #[tokio::test]
    async fn re_enabling_schedules_a_future_date() {
        let (server, _, token, _) = test_server();

        server
            .put(endpoints::REPORT_SETTING)
            .authorization_bearer(&token)
            .json(&json!({ "frequency": "MONTHLY", "is_enabled": false }))
            .await
            .assert_status_ok();

        let setting = server
            .put(endpoints::REPORT_SETTING)
            .authorization_bearer(&token)
            .json(&json!({ "frequency": "DAILY", "is_enabled": true }))
            .await
            .json::<ReportSetting>();

        let today = OffsetDateTime::now_utc().date();
        assert_eq!(setting.next_report_date, Some(today + Duration::days(1)));
    }

    #[tokio::test]
    async fn unknown_frequency_is_rejected() {
        let (server, _, token, _) = test_server();

        server
            .put(endpoints::REPORT_SETTING)
            .authorization_bearer(&token)
            .json(&json!({ "frequency": "HOURLY", "is_enabled": true }))
            .await
            .assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn report_history_pages_and_requires_auth() {
        let (server, state, token, user_id) = test_server();

        {
            let connection = state.db_connection.lock().unwrap();
            let now = OffsetDateTime::now_utc();
            insert_report(user_id, "Jan 1 - 31, 2024", now, ReportStatus::Sent, &connection)
                .unwrap();
        }

        server.get(endpoints::REPORTS).await.assert_status_unauthorized();

        let body = server
            .get(endpoints::REPORTS)
            .authorization_bearer(&token)
            .await
            .json::<serde_json::Value>();

        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["status"], "SENT");
    }
}
