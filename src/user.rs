//! Defines the user model, its database queries, and the route handler for
//! fetching the authenticated user.

use axum::{Json, extract::State};
use rusqlite::{Connection, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{AppState, Error, auth::Claims, database_id::DatabaseId};

/// Alias for the integer type used for user IDs.
pub type UserId = DatabaseId;

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// The ID of the user.
    pub id: UserId,
    /// The user's display name.
    pub name: String,
    /// The user's email address, unique across the application.
    pub email: String,
    /// The bcrypt hash of the user's password. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// When the user registered.
    pub created_at: OffsetDateTime,
}

/// Create the user table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create a new user in the database.
///
/// The caller is responsible for hashing the password; this function stores
/// `password_hash` verbatim.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateEmail] if the email is already registered,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_user(
    name: &str,
    email: &str,
    password_hash: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let user = connection
        .prepare(
            "INSERT INTO user (name, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, name, email, password_hash, created_at",
        )?
        .query_row(
            (name, email, password_hash, OffsetDateTime::now_utc()),
            map_user_row,
        )?;

    Ok(user)
}

/// Retrieve a user from the database by their email address.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if no user has the given email,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    let user = connection
        .prepare(
            "SELECT id, name, email, password_hash, created_at FROM user WHERE email = :email",
        )?
        .query_row(&[(":email", &email)], map_user_row)?;

    Ok(user)
}

/// Retrieve a user from the database by their `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a registered user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_user_by_id(id: UserId, connection: &Connection) -> Result<User, Error> {
    let user = connection
        .prepare("SELECT id, name, email, password_hash, created_at FROM user WHERE id = :id")?
        .query_row(&[(":id", &id)], map_user_row)?;

    Ok(user)
}

/// A route handler for fetching the user the bearer token belongs to.
///
/// The password hash is never serialized into the response.
///
/// # Errors
/// Returns [Error::NotFound] if the token's user no longer exists.
pub async fn get_current_user_endpoint(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<User>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let user = get_user_by_id(claims.user_id, &connection)?;

    Ok(Json(user))
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    map_user_row_prefixed(row, 0)
}

/// Map a database row to a [User] whose columns start at `offset`.
///
/// Used by queries that join the user table onto another table's columns.
pub(crate) fn map_user_row_prefixed(row: &Row, offset: usize) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        email: row.get(offset + 2)?,
        password_hash: row.get(offset + 3)?,
        created_at: row.get(offset + 4)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod endpoint_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{AppState, auth::encode_jwt, endpoints, routing::build_router, user::create_user};

    fn test_server() -> (TestServer, String) {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn, "foobar", "cron-secret").unwrap();

        let user = {
            let connection = state.db_connection.lock().unwrap();
            create_user("Test", "foo@bar.baz", "hash", &connection).unwrap()
        };
        let token = encode_jwt(user.id, &state.jwt_keys).unwrap();

        let server = TestServer::new(build_router(state));

        (server, token)
    }

    #[tokio::test]
    async fn me_without_token_is_unauthorized() {
        let (server, _) = test_server();

        server.get(endpoints::USER_ME).await.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn me_returns_the_token_owner_without_the_hash() {
        let (server, token) = test_server();

        let response = server.get(endpoints::USER_ME).authorization_bearer(&token).await;

        response.assert_status_ok();
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["email"], "foo@bar.baz");
        assert_eq!(body["name"], "Test");
        assert!(body.get("password_hash").is_none());
    }
}
