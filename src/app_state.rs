//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    auth::JwtKeys,
    db::initialize,
    insights::{HeuristicInsights, InsightGenerator},
    mailer::{LogMailer, ReportMailer},
    scheduler::JobLocks,
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The keys used for signing and verifying auth tokens.
    pub jwt_keys: JwtKeys,

    /// The shared secret that authorizes manual batch-job triggers.
    pub cron_secret: String,

    /// The transport that delivers report emails.
    pub mailer: Arc<dyn ReportMailer>,

    /// The backend that writes report insights.
    pub insight_generator: Arc<dyn InsightGenerator>,

    /// The per-job locks that keep scheduled and manual runs from overlapping.
    pub job_locks: JobLocks,

    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the
    /// domain models. Reports are delivered with [LogMailer] and decorated by
    /// [HeuristicInsights]; use [AppState::with_mailer] to plug in a real
    /// transport.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, jwt_secret: &str, cron_secret: &str) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            jwt_keys: JwtKeys::new(jwt_secret),
            cron_secret: cron_secret.to_owned(),
            mailer: Arc::new(LogMailer),
            insight_generator: Arc::new(HeuristicInsights),
            job_locks: JobLocks::default(),
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }

    /// Replace the report email transport.
    pub fn with_mailer(mut self, mailer: Arc<dyn ReportMailer>) -> Self {
        self.mailer = mailer;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("jwt_keys", &self.jwt_keys)
            .field("db_connection", &self.db_connection)
            .finish_non_exhaustive()
    }
}
