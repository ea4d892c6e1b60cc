//! The analytics summary endpoint and its period arithmetic.

use std::ops::RangeInclusive;

use axum::{
    Json,
    extract::{Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::Claims,
    jobs::start_of_month,
    report::{period_label, savings_rate},
    user::UserId,
};

/// The preset periods the analytics summary can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalyticsPeriod {
    #[default]
    ThisMonth,
    LastMonth,
    Last30Days,
    ThisYear,
    AllTime,
}

/// The query parameters of an analytics summary request.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct AnalyticsQuery {
    /// The period to summarize, defaulting to the current month.
    #[serde(default)]
    pub period: AnalyticsPeriod,
}

/// The analytics summary of one user's period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    /// Human-readable label of the period.
    pub period: String,
    /// Total income in cents.
    pub income: i64,
    /// Total expenses in cents.
    pub expenses: i64,
    /// Income minus expenses, in cents.
    pub available_balance: i64,
    /// Percentage of income retained after expenses.
    pub savings_rate: f64,
    /// How many transactions fell inside the period.
    pub transaction_count: u64,
    /// Income change versus the preceding period of equal length, in percent.
    /// Absent for the all-time period, which has nothing to compare against.
    pub income_change: Option<f64>,
    /// Expense change versus the preceding period of equal length, in percent.
    pub expense_change: Option<f64>,
}

/// A route handler for the user's analytics summary.
///
/// # Errors
/// Returns an error if there is an unexpected SQL error.
pub async fn get_analytics_summary_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsSummary>, Error> {
    let today = OffsetDateTime::now_utc().date();
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;

    let summary = analytics_summary(claims.user_id, query.period, today, &connection)?;

    Ok(Json(summary))
}

/// Summarize a user's transactions over a preset period ending at `today`.
fn analytics_summary(
    user_id: UserId,
    period: AnalyticsPeriod,
    today: Date,
    connection: &Connection,
) -> Result<AnalyticsSummary, Error> {
    let window = analytics_window(period, today);

    let (income, expenses, transaction_count) =
        period_totals(user_id, window.as_ref(), connection)?;

    let (income_change, expense_change) = match &window {
        None => (None, None),
        Some(window) => {
            let previous = preceding_window(window);
            let (previous_income, previous_expenses, _) =
                period_totals(user_id, Some(&previous), connection)?;

            (
                Some(percentage_change(income, previous_income)),
                Some(percentage_change(expenses, previous_expenses)),
            )
        }
    };

    Ok(AnalyticsSummary {
        period: window
            .as_ref()
            .map(period_label)
            .unwrap_or_else(|| "All time".to_owned()),
        income,
        expenses,
        available_balance: income - expenses,
        savings_rate: savings_rate(income, expenses),
        transaction_count,
        income_change,
        expense_change,
    })
}

/// The date window a preset covers, or `None` for the unbounded all-time
/// period.
fn analytics_window(period: AnalyticsPeriod, today: Date) -> Option<RangeInclusive<Date>> {
    match period {
        AnalyticsPeriod::ThisMonth => Some(start_of_month(today)..=today),
        AnalyticsPeriod::LastMonth => {
            let end = start_of_month(today) - Duration::days(1);
            Some(start_of_month(end)..=end)
        }
        AnalyticsPeriod::Last30Days => Some(today - Duration::days(29)..=today),
        AnalyticsPeriod::ThisYear => {
            // January 1 always exists.
            let start = Date::from_calendar_date(today.year(), Month::January, 1)
                .unwrap_or(today);
            Some(start..=today)
        }
        AnalyticsPeriod::AllTime => None,
    }
}

/// The window of equal length immediately before `window`.
fn preceding_window(window: &RangeInclusive<Date>) -> RangeInclusive<Date> {
    let length = *window.end() - *window.start() + Duration::days(1);

    (*window.start() - length)..=(*window.start() - Duration::days(1))
}

/// Percentage change from `previous` to `current`.
///
/// A zero baseline reports 100% when there is now activity and 0% when there
/// is still none.
fn percentage_change(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }

    ((current - previous) as f64 / (previous.abs() as f64)) * 100.0
}

fn period_totals(
    user_id: UserId,
    window: Option<&RangeInclusive<Date>>,
    connection: &Connection,
) -> Result<(i64, i64, u64), Error> {
    let date_clause = match window {
        Some(_) => "AND date BETWEEN :from AND :to",
        None => "",
    };
    let sql = format!(
        "SELECT
             COALESCE(SUM(CASE WHEN transaction_type = 'INCOME' THEN ABS(amount) ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN transaction_type = 'EXPENSE' THEN ABS(amount) ELSE 0 END), 0),
             COUNT(id)
         FROM \"transaction\"
         WHERE user_id = :user_id {date_clause}"
    );

    let mut statement = connection.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)? as u64,
        ))
    };

    let totals = match window {
        Some(window) => statement.query_row(
            &[
                (":user_id", &user_id as &dyn rusqlite::ToSql),
                (":from", window.start()),
                (":to", window.end()),
            ],
            map_row,
        )?,
        None => statement.query_row(&[(":user_id", &user_id)], map_row)?,
    };

    Ok(totals)
}

// ============================================================================
// TESTS
// ============================================================================
