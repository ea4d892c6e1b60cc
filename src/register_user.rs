//! Defines the route handler for registering a new user.

use axum::{Json, extract::State, http::StatusCode};
use email_address::EmailAddress;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::encode_jwt,
    jobs::next_report_date,
    log_in::AuthResponse,
    report::{ReportFrequency, create_default_report_setting},
    user::create_user,
};

/// The fewest characters a password may have.
const MIN_PASSWORD_LENGTH: usize = 8;

/// The details a new user registers with.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    /// The user's display name.
    pub name: String,
    /// The email to register. Must not belong to an existing user.
    pub email: String,
    /// The password, at least [MIN_PASSWORD_LENGTH] characters.
    pub password: String,
}

/// Handler for registration requests.
///
/// Registration also creates the user's default report setting (monthly,
/// enabled) in the same atomic scope, so every user the report job sees has a
/// schedule row.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email is not a valid email address.
/// - The email already belongs to a registered user.
/// - The password is too short.
/// - An internal error occurred when hashing the password.
pub async fn register_user(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<AuthResponse>), Error> {
    if !EmailAddress::is_valid(&form.email) {
        return Err(Error::InvalidEmail(form.email));
    }

    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::InvalidFieldValue("password".to_owned()));
    }

    let password_hash = bcrypt::hash(&form.password, bcrypt::DEFAULT_COST)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    let user = {
        let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
        let transaction = connection.unchecked_transaction()?;

        let user = create_user(&form.name, &form.email, &password_hash, &transaction)?;
        let today = OffsetDateTime::now_utc().date();
        create_default_report_setting(
            user.id,
            next_report_date(ReportFrequency::Monthly, today),
            &transaction,
        )?;

        transaction.commit()?;
        user
    };

    let token = encode_jwt(user.id, &state.jwt_keys)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

// ============================================================================
// TESTS
// ============================================================================
