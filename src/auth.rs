//! Credentials and bearer tokens: bcrypt for password hashes, HS256 JWTs
//! for the stateless session token. The rest of the service treats the
//! token as opaque.

use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::handlers::AppError;

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &str) -> TokenKeys {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|err| {
        tracing::error!("Failed to hash password: {}", err);
        AppError::Internal
    })
}

pub fn verify_password(password: &str, hashed: &str) -> Result<(), AppError> {
    match bcrypt::verify(password, hashed) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::Unauthorized(String::from("unauthorized"))),
        Err(err) => {
            tracing::error!("Failed to verify password hash: {}", err);
            Err(AppError::Unauthorized(String::from("unauthorized")))
        }
    }
}

pub fn issue_token(keys: &TokenKeys, user_id: i64, ttl: Duration) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id,
        exp: (Utc::now() + ttl).timestamp(),
    };
    jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding).map_err(|err| {
        tracing::error!("Failed to sign token: {}", err);
        AppError::Internal
    })
}

pub fn resolve_token(keys: &TokenKeys, token: &str) -> Result<i64, AppError> {
    jsonwebtoken::decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map(|data| data.claims.sub)
        .map_err(|err| AppError::Unauthorized(format!("unauthorized: {}", err)))
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized(String::from("missing bearer token")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_resolves_to_the_same_user() {
        let keys = TokenKeys::from_secret("test-secret");
        let token = issue_token(&keys, 42, Duration::hours(1)).unwrap();
        assert_eq!(resolve_token(&keys, &token).unwrap(), 42);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let keys = TokenKeys::from_secret("test-secret");
        let other = TokenKeys::from_secret("other-secret");
        let token = issue_token(&other, 42, Duration::hours(1)).unwrap();
        assert!(matches!(
            resolve_token(&keys, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = TokenKeys::from_secret("test-secret");
        // Beyond the default validation leeway.
        let token = issue_token(&keys, 42, Duration::minutes(-5)).unwrap();
        assert!(matches!(
            resolve_token(&keys, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hashed).is_ok());
        assert!(matches!(
            verify_password("hunter3", &hashed),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");

        let mut bad = HeaderMap::new();
        bad.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&bad).is_err());
        assert!(bearer_token(&HeaderMap::new()).is_err());
    }
}
