//! Defines the app level error type and its conversion to JSON error responses.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid combination of email and password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request did not carry a valid bearer token.
    #[error("invalid or missing auth token")]
    InvalidToken,

    /// An auth token could not be created.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("could not create auth token: {0}")]
    TokenCreation(String),

    /// The user provided an email address that is not valid.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The specified email already belongs to a registered user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// Clients should only see a general internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A stored or submitted report frequency string did not name a known
    /// frequency.
    #[error("\"{0}\" is not a valid report frequency")]
    InvalidFrequency(String),

    /// A stored or submitted recurring interval string did not name a known
    /// interval.
    #[error("\"{0}\" is not a valid recurring interval")]
    InvalidInterval(String),

    /// A stored or submitted enum value did not match any known variant.
    #[error("\"{0}\" is not a valid value for this field")]
    InvalidFieldValue(String),

    /// A recurring transaction was submitted without a recurring interval.
    #[error("recurring transactions must specify a recurring interval")]
    InvalidRecurrence,

    /// The requested resource was not found.
    ///
    /// Internally, this error also occurs when a due record vanishes between
    /// the due-record query and the transactional re-fetch.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An email could not be delivered.
    ///
    /// This error must never escalate past the report job; it downgrades the
    /// report status instead.
    #[error("could not send email: {0}")]
    EmailError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, message) = match &self {
            Error::InvalidCredentials | Error::InvalidToken => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Error::InvalidEmail(_)
            | Error::InvalidFrequency(_)
            | Error::InvalidInterval(_)
            | Error::InvalidFieldValue(_)
            | Error::InvalidRecurrence => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::DuplicateEmail => (StatusCode::CONFLICT, self.to_string()),
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            // Any errors not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an internal server error occurred".to_owned(),
                )
            }
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::Error;

    #[test]
    fn sql_no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }

    #[test]
    fn not_found_renders_404() {
        let response = Error::NotFound.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_credentials_renders_401() {
        let response = Error::InvalidCredentials.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let response = Error::HashingError("bcrypt exploded".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
