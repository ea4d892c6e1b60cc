//! JSON Web Token creation, validation, and the [Claims] request extractor.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{AppState, Error, user::UserId};

// Code in this module is adapted from https://github.com/ezesundayeze/axum--auth
// and https://github.com/tokio-rs/axum/blob/main/examples/jwt/src/main.rs

/// How long an auth token stays valid after it is issued.
const TOKEN_DURATION: Duration = Duration::hours(24);

/// The signing and verification keys derived from the server secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Derive the key pair from a shared `secret` string.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

/// The contents of a JSON Web Token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The expiry time of the token as a unix timestamp.
    pub exp: usize,
    /// The time the token was issued as a unix timestamp.
    pub iat: usize,
    /// The ID of the user the token was issued to.
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for Claims {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or(Error::InvalidToken)?;

        let token_data = decode_jwt(bearer, &state.jwt_keys)?;

        Ok(token_data.claims)
    }
}

/// Create a signed auth token for `user_id`.
///
/// # Errors
/// Returns an [Error::TokenCreation] if the token could not be signed.
pub fn encode_jwt(user_id: UserId, keys: &JwtKeys) -> Result<String, Error> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        exp: (now + TOKEN_DURATION).unix_timestamp() as usize,
        iat: now.unix_timestamp() as usize,
        user_id,
    };

    encode(&Header::default(), &claims, &keys.encoding)
        .map_err(|error| Error::TokenCreation(error.to_string()))
}

fn decode_jwt(token: &str, keys: &JwtKeys) -> Result<jsonwebtoken::TokenData<Claims>, Error> {
    decode(token, &keys.decoding, &Validation::default()).map_err(|_| Error::InvalidToken)
}

#[cfg(test)]
mod auth_tests {
    use super::{JwtKeys, decode_jwt, encode_jwt};

    #[test]
    fn decode_jwt_gives_back_the_user_id() {
        let keys = JwtKeys::new("foobar");

        let token = encode_jwt(42, &keys).unwrap();
        let claims = decode_jwt(&token, &keys).unwrap().claims;

        assert_eq!(claims.user_id, 42);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn decode_jwt_rejects_a_token_from_another_secret() {
        let token = encode_jwt(42, &JwtKeys::new("foobar")).unwrap();

        let result = decode_jwt(&token, &JwtKeys::new("different"));

        assert!(result.is_err());
    }
}
