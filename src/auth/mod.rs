use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::database::models::User;
use crate::types::Role;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("{0}")]
    WeakPassword(String),
    #[error("JWT secret is not configured")]
    MissingSecret,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
}

/// Session token payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub practice_id: Uuid,
    pub role: Role,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            practice_id: user.practice_id,
            role: user.role,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Issue a session token for a user with the configured secret and expiry
pub fn issue_token(user: &User) -> Result<String, AuthError> {
    let security = &config::config().security;
    encode_token(&Claims::for_user(user, security.session_expiry_hours), &security.jwt_secret)
}

pub fn verify_token(token: &str) -> Result<Claims, AuthError> {
    decode_token(token, &config::config().security.jwt_secret)
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// bcrypt runs on the blocking pool so request workers stay free
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    validate_password(password)?;
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Malformed stored hashes count as a failed match
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: Uuid::new_v4(),
            practice_id: Uuid::new_v4(),
            role: Role::Manager,
            email: "manager@example.com".into(),
            iat: now,
            exp: now + 3600,
        }
    }

    #[test]
    fn tokens_round_trip_with_the_same_secret() {
        let claims = claims();
        let token = encode_token(&claims, "secret").unwrap();
        assert_eq!(decode_token(&token, "secret").unwrap(), claims);
        assert!(matches!(decode_token(&token, "other"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut claims = claims();
        claims.iat -= 7200;
        claims.exp = Utc::now().timestamp() - 3600;
        let token = encode_token(&claims, "secret").unwrap();
        assert!(decode_token(&token, "secret").is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(encode_token(&claims(), ""), Err(AuthError::MissingSecret)));
    }

    #[tokio::test]
    async fn passwords_hash_and_verify() {
        assert!(matches!(hash_password("short").await, Err(AuthError::WeakPassword(_))));
        let hash = bcrypt::hash("correct horse", 4).unwrap();
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("wrong horse", &hash).await.unwrap());
        assert!(!verify_password("anything", "not-a-bcrypt-hash").await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_does_not_block_the_runtime() {
        let hashing = tokio::spawn(hash_password("correct horse battery"));
        let ticker = tokio::spawn(async { tokio::task::yield_now().await; "ticked" });
        assert_eq!(ticker.await.unwrap(), "ticked");
        let hash = hashing.await.unwrap().unwrap();
        assert!(verify_password("correct horse battery", &hash).await.unwrap());
    }
}
