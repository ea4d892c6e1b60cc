//! Expense Hub is a web app for tracking personal income and expenses.
//!
//! This library provides a JSON REST API plus the background jobs that keep
//! recurring transactions and scheduled email reports moving: a daily job
//! materializes due recurring transactions, and a monthly job generates and
//! emails financial reports.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod analytics;
mod app_state;
pub mod auth;
mod database_id;
mod db;
pub mod endpoints;
mod error;
pub mod insights;
pub mod jobs;
mod log_in;
pub mod mailer;
mod pagination;
mod register_user;
pub mod report;
mod routing;
pub mod scheduler;
pub mod transaction;
pub mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use error::Error;
pub use pagination::{Paginated, PaginationQuery};
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
