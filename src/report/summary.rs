//! Builds the per-period financial summary that reports are rendered from.

use std::ops::RangeInclusive;

use rusqlite::Connection;
use serde::Serialize;
use time::{Date, Month};

use crate::{Error, user::UserId};

/// How many expense categories a report lists.
const TOP_CATEGORY_COUNT: u32 = 5;

/// One expense category's share of a period's spending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    /// The category name.
    pub category: String,
    /// Total spent in the category, in cents.
    pub amount: i64,
    /// The category's share of total expenses, in percent.
    pub percentage: f64,
}

/// The financial summary of one user's period, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Human-readable label of the period, e.g. "Feb 1 - 29, 2024".
    pub period: String,
    /// Total income in cents.
    pub income: i64,
    /// Total expenses in cents.
    pub expenses: i64,
    /// Income minus expenses, in cents. May be negative.
    pub available_balance: i64,
    /// Percentage of income retained after expenses; 0 when there was no
    /// income.
    pub savings_rate: f64,
    /// The biggest expense categories of the period, largest first.
    pub top_categories: Vec<CategorySpend>,
    /// Natural-language observations, filled in by the insight generator.
    pub insights: Vec<String>,
}

/// Summarize a user's transactions inside `window`.
///
/// Returns `None` when the window has zero income and zero expenses, which
/// the report job records as a no-activity period.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn financial_summary(
    user_id: UserId,
    window: &RangeInclusive<Date>,
    connection: &Connection,
) -> Result<Option<ReportSummary>, Error> {
    let (income, expenses): (i64, i64) = connection.query_row(
        "SELECT
             COALESCE(SUM(CASE WHEN transaction_type = 'INCOME' THEN ABS(amount) ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN transaction_type = 'EXPENSE' THEN ABS(amount) ELSE 0 END), 0)
         FROM \"transaction\"
         WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3",
        (user_id, window.start(), window.end()),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    if income == 0 && expenses == 0 {
        return Ok(None);
    }

    let top_categories = connection
        .prepare(
            "SELECT category, SUM(ABS(amount)) AS total
             FROM \"transaction\"
             WHERE user_id = ?1 AND transaction_type = 'EXPENSE' AND date BETWEEN ?2 AND ?3
             GROUP BY category
             ORDER BY total DESC
             LIMIT ?4",
        )?
        .query_map(
            (user_id, window.start(), window.end(), TOP_CATEGORY_COUNT),
            |row| {
                let amount: i64 = row.get(1)?;
                Ok(CategorySpend {
                    category: row.get(0)?,
                    amount,
                    percentage: share_of(amount, expenses),
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(ReportSummary {
        period: period_label(window),
        income,
        expenses,
        available_balance: income - expenses,
        savings_rate: savings_rate(income, expenses),
        top_categories,
        insights: Vec::new(),
    }))
}

/// Percentage of income retained after expenses; 0 when income is zero or
/// negative.
pub fn savings_rate(income: i64, expenses: i64) -> f64 {
    if income <= 0 {
        return 0.0;
    }

    ((income - expenses) as f64 / income as f64) * 100.0
}

fn share_of(amount: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }

    (amount as f64 / total as f64) * 100.0
}

/// Render a window as a human-readable period label.
///
/// Windows inside one month print the month once ("Feb 1 - 29, 2024");
/// windows that span months print it on both ends ("Jan 1 - Mar 31, 2024").
pub fn period_label(window: &RangeInclusive<Date>) -> String {
    let (from, to) = (window.start(), window.end());

    if from.month() == to.month() && from.year() == to.year() {
        format!(
            "{} {} - {}, {}",
            month_abbreviation(from.month()),
            from.day(),
            to.day(),
            to.year()
        )
    } else {
        format!(
            "{} {} - {} {}, {}",
            month_abbreviation(from.month()),
            from.day(),
            month_abbreviation(to.month()),
            to.day(),
            to.year()
        )
    }
}

fn month_abbreviation(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod summary_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        db::initialize,
        transaction::{Transaction, TransactionType, create_transaction},
        user::create_user,
    };

    use super::{financial_summary, period_label, savings_rate};

    fn get_test_connection() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("Test", "foo@bar.baz", "hash", &conn).unwrap();

        (conn, user.id)
    }

    fn spend(conn: &Connection, user_id: i64, category: &str, cents: i64, day: time::Date) {
        create_transaction(
            Transaction::build(user_id, category, TransactionType::Expense, cents, category, day),
            conn,
        )
        .unwrap();
    }

    #[test]
    fn savings_rate_matches_expected_values() {
        assert_eq!(savings_rate(1_000, 400), 60.0);
        assert_eq!(savings_rate(0, 500), 0.0);
        assert_eq!(savings_rate(-100, 0), 0.0);
    }

    #[test]
    fn empty_window_yields_no_summary() {
        let (conn, user_id) = get_test_connection();

        let summary =
            financial_summary(user_id, &(date!(2024 - 02 - 01)..=date!(2024 - 02 - 29)), &conn)
                .unwrap();

        assert_eq!(summary, None);
    }

    #[test]
    fn totals_cover_only_the_window() {
        let (conn, user_id) = get_test_connection();
        create_transaction(
            Transaction::build(
                user_id,
                "Salary",
                TransactionType::Income,
                100_000,
                "Salary",
                date!(2024 - 02 - 05),
            ),
            &conn,
        )
        .unwrap();
        spend(&conn, user_id, "Food", 40_000, date!(2024 - 02 - 10));
        // Outside the window.
        spend(&conn, user_id, "Food", 99_999, date!(2024 - 03 - 01));

        let summary =
            financial_summary(user_id, &(date!(2024 - 02 - 01)..=date!(2024 - 02 - 29)), &conn)
                .unwrap()
                .unwrap();

        assert_eq!(summary.income, 100_000);
        assert_eq!(summary.expenses, 40_000);
        assert_eq!(summary.available_balance, 60_000);
        assert_eq!(summary.savings_rate, 60.0);
        assert_eq!(summary.period, "Feb 1 - 29, 2024");
    }

    #[test]
    fn top_categories_are_capped_at_five_and_sorted() {
        let (conn, user_id) = get_test_connection();
        for (category, cents) in [
            ("Housing", 120_000),
            ("Food", 45_000),
            ("Transport", 30_000),
            ("Health", 20_000),
            ("Entertainment", 10_000),
            ("Misc", 5_000),
        ] {
            spend(&conn, user_id, category, cents, date!(2024 - 02 - 10));
        }

        let summary =
            financial_summary(user_id, &(date!(2024 - 02 - 01)..=date!(2024 - 02 - 29)), &conn)
                .unwrap()
                .unwrap();

        assert_eq!(summary.top_categories.len(), 5);
        assert_eq!(summary.top_categories[0].category, "Housing");
        assert!(summary.top_categories.iter().all(|c| c.category != "Misc"));
        let housing_share = summary.top_categories[0].percentage;
        assert!((housing_share - 52.17).abs() < 0.01);
    }

    #[test]
    fn period_label_spanning_months_names_both() {
        assert_eq!(
            period_label(&(date!(2024 - 01 - 01)..=date!(2024 - 03 - 31))),
            "Jan 1 - Mar 31, 2024"
        );
    }
}
