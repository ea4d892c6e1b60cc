//! Renders a financial summary into a report email.

use crate::{mailer::EmailMessage, report::{ReportFrequency, ReportSummary}};

/// Render the report email for one user and period.
pub fn render_report_email(
    to: &str,
    username: &str,
    frequency: ReportFrequency,
    summary: &ReportSummary,
) -> EmailMessage {
    let subject = format!("{} Financial Report - {}", frequency, summary.period);

    let mut text = format!(
        "Your {} Financial Report ({})\n\
         Income: {}\n\
         Expenses: {}\n\
         Balance: {}\n\
         Savings Rate: {:.2}%\n",
        frequency,
        summary.period,
        format_cents(summary.income),
        format_cents(summary.expenses),
        format_cents(summary.available_balance),
        summary.savings_rate,
    );
    if !summary.insights.is_empty() {
        text.push('\n');
        text.push_str(&summary.insights.join("\n"));
        text.push('\n');
    }

    let mut category_rows = String::new();
    for spend in &summary.top_categories {
        category_rows.push_str(&format!(
            "<li>{}: {} ({:.1}%)</li>",
            spend.category,
            format_cents(spend.amount),
            spend.percentage
        ));
    }
    let insight_rows: String = summary
        .insights
        .iter()
        .map(|insight| format!("<li>{insight}</li>"))
        .collect();

    let html = format!(
        "<h1>Hi {username},</h1>\
         <p>Here is your {frequency} financial report for {period}.</p>\
         <ul>\
         <li>Income: {income}</li>\
         <li>Expenses: {expenses}</li>\
         <li>Available balance: {balance}</li>\
         <li>Savings rate: {savings_rate:.2}%</li>\
         </ul>\
         <h2>Top spending categories</h2><ul>{category_rows}</ul>\
         <h2>Insights</h2><ul>{insight_rows}</ul>",
        period = summary.period,
        income = format_cents(summary.income),
        expenses = format_cents(summary.expenses),
        balance = format_cents(summary.available_balance),
        savings_rate = summary.savings_rate,
    );

    EmailMessage {
        to: to.to_owned(),
        subject,
        text,
        html,
    }
}

/// Format an amount of cents as a dollar string, e.g. `-12345` -> `-$123.45`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();

    format!("{sign}${}.{:02}", magnitude / 100, magnitude % 100)
}
