//! The text-generation seam for report insights.

use crate::report::ReportSummary;

/// Produces natural-language observations about a financial summary.
///
/// Insight generation is best-effort decoration: implementations must never
/// fail. A backend that cannot produce anything (rate limit, outage) returns
/// an empty list and the report goes out without insights.
pub trait InsightGenerator: Send + Sync {
    /// Derive short observations from `summary`.
    fn summarize(&self, summary: &ReportSummary) -> Vec<String>;
}

/// Derives insights from the summary totals with fixed rules.
///
/// Stands in for a hosted text-generation backend; the trait seam is where a
/// real one would plug in.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicInsights;

impl InsightGenerator for HeuristicInsights {
    fn summarize(&self, summary: &ReportSummary) -> Vec<String> {
        let mut insights = Vec::new();

        if summary.available_balance < 0 {
            insights.push(format!(
                "You spent more than you earned this period ({}).",
                summary.period
            ));
        } else if summary.savings_rate >= 20.0 {
            insights.push(format!(
                "Great work: you saved {:.1}% of your income this period.",
                summary.savings_rate
            ));
        } else if summary.income > 0 {
            insights.push(format!(
                "You saved {:.1}% of your income this period.",
                summary.savings_rate
            ));
        }

        if let Some(top) = summary.top_categories.first() {
            insights.push(format!(
                "Your biggest expense category was {} at {:.1}% of total spending.",
                top.category, top.percentage
            ));
        }

        insights
    }
}

#[cfg(test)]
mod insight_tests {
    use crate::report::{CategorySpend, ReportSummary};

    use super::{HeuristicInsights, InsightGenerator};

    fn summary(income: i64, expenses: i64) -> ReportSummary {
        ReportSummary {
            period: "Feb 1 - 29, 2024".to_owned(),
            income,
            expenses,
            available_balance: income - expenses,
            savings_rate: crate::report::savings_rate(income, expenses),
            top_categories: vec![CategorySpend {
                category: "Housing".to_owned(),
                amount: expenses,
                percentage: 100.0,
            }],
            insights: Vec::new(),
        }
    }

    #[test]
    fn overspending_is_called_out() {
        let insights = HeuristicInsights.summarize(&summary(1_000, 2_000));

        assert!(insights[0].contains("more than you earned"));
    }

    #[test]
    fn strong_savings_are_praised() {
        let insights = HeuristicInsights.summarize(&summary(100_000, 40_000));

        assert!(insights[0].contains("60.0%"));
        assert!(insights[1].contains("Housing"));
    }
}
