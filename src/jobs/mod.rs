//! The periodic batch jobs and the calendar arithmetic they are built on.
//!
//! Jobs are plain synchronous functions over the shared database connection so
//! they can be driven by the [scheduler](crate::scheduler), by the
//! authenticated admin endpoints, and by tests alike.

mod dates;
mod endpoints;
mod recurring;
mod report_job;

pub use dates::{next_occurrence, next_report_date, report_period_window};
pub use endpoints::{
    JobTriggerResponse, trigger_recurring_job_endpoint, trigger_report_job_endpoint,
};
pub use recurring::process_recurring_transactions;
pub use report_job::process_report_job;

pub(crate) use dates::{add_months, start_of_month};

use serde::Serialize;

/// The tally of one batch-job run, used for observability only.
///
/// A failure recorded here is a per-record failure: the record's atomic scope
/// was rolled back and the record stays due for the next run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    /// Records whose atomic scope committed.
    #[serde(rename = "processedCount")]
    pub processed: u32,
    /// Records whose atomic scope rolled back.
    #[serde(rename = "failedCount")]
    pub failed: u32,
    /// All due records seen by this run.
    #[serde(rename = "totalCount")]
    pub total: u32,
}
