//! Scheduled financial reports: settings, summaries, rendering, and history.

mod core;
mod email;
mod endpoints;
mod summary;

pub use core::{
    Report, ReportFrequency, ReportSetting, ReportSettingUpdate, ReportStatus,
    count_reports, create_default_report_setting, create_report_tables, find_due_settings,
    get_report_setting, insert_report, list_reports, update_report_setting,
    update_setting_after_run,
};
pub use email::{format_cents, render_report_email};
pub use endpoints::{
    UpdateReportSetting, get_report_setting_endpoint, get_reports_endpoint,
    update_report_setting_endpoint,
};
pub use summary::{CategorySpend, ReportSummary, financial_summary, period_label, savings_rate};
