//! Defines the route handler for logging in a user.

use axum::{Json, extract::State};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::encode_jwt,
    user::{User, get_user_by_email},
};

/// The credentials a user logs in with.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Email entered during log-in.
    pub email: EmailAddress,
    /// Password entered during log-in.
    pub password: String,
}

/// The response to a successful log-in or registration.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// The bearer token for subsequent requests.
    pub token: String,
    /// The authenticated user.
    pub user: User,
}

/// Handler for log-in requests.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email does not belong to a registered user.
/// - The password is not correct.
/// - An internal error occurred when verifying the password.
pub async fn log_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthResponse>, Error> {
    let user = {
        let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;

        get_user_by_email(credentials.email.as_str(), &connection).map_err(|error| match error {
            // Do not reveal whether the email is registered.
            Error::NotFound => Error::InvalidCredentials,
            other => other,
        })?
    };

    let password_is_correct = bcrypt::verify(&credentials.password, &user.password_hash)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let token = encode_jwt(user.id, &state.jwt_keys)?;

    Ok(Json(AuthResponse { token, user }))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod log_in_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{AppState, endpoints, routing::build_router};

    async fn test_server_with_user() -> TestServer {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn, "foobar", "cron-secret").unwrap();
        let server =
            TestServer::new(build_router(state));

        server
            .post(endpoints::USERS)
            .json(&json!({
                "name": "Test",
                "email": "foo@bar.baz",
                "password": "averysafeandsecurepassword",
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        server
    }

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let server = test_server_with_user().await;

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "foo@bar.baz",
                "password": "averysafeandsecurepassword",
            }))
            .await;

        response.assert_status_ok();
        let body = response.json::<serde_json::Value>();
        assert!(!body["token"].as_str().unwrap().is_empty());
        assert_eq!(body["user"]["email"], "foo@bar.baz");
        // The password hash must never leave the server.
        assert!(body["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let server = test_server_with_user().await;

        server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "foo@bar.baz",
                "password": "definitelyNotTheCorrectPassword",
            }))
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn log_in_fails_for_unknown_email() {
        let server = test_server_with_user().await;

        server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "nobody@bar.baz",
                "password": "averysafeandsecurepassword",
            }))
            .await
            .assert_status_unauthorized();
    }
}
