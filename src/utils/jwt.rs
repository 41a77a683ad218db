// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// How long an email-verification token stays valid.
const EMAIL_TOKEN_EXPIRATION_SECONDS: u64 = 24 * 60 * 60;

/// Session token claims.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// User's role as stored ('USER', 'ADMIN').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Claims for the single-purpose email-verification token.
#[derive(Debug, Deserialize, Serialize)]
pub struct EmailTokenClaims {
    pub sub: String,
    pub purpose: String,
    pub exp: usize,
}

fn unix_now() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .as_secs() as usize)
}

/// Signs a new session JWT for the user.
pub fn sign_jwt(
    id: i64,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: id.to_string(),
        role: role.to_owned(),
        exp: unix_now()? + expiration_seconds as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// Verifies and decodes a session JWT.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthenticated("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Signs the token embedded in the verification email link.
pub fn sign_email_token(id: i64, secret: &str) -> Result<String, AppError> {
    let claims = EmailTokenClaims {
        sub: id.to_string(),
        purpose: "email-verification".to_string(),
        exp: unix_now()? + EMAIL_TOKEN_EXPIRATION_SECONDS as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// Verifies an email-verification token and returns the user id it names.
pub fn verify_email_token(token: &str, secret: &str) -> Result<i64, AppError> {
    let token_data = decode::<EmailTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Validation("Invalid or expired verification token".to_string()))?;

    if token_data.claims.purpose != "email-verification" {
        return Err(AppError::Validation(
            "Invalid or expired verification token".to_string(),
        ));
    }

    token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Validation("Invalid or expired verification token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_round_trips() {
        let token = sign_jwt(42, "ADMIN", "secret", 600).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, "ADMIN");
    }

    #[test]
    fn session_token_rejects_wrong_secret() {
        let token = sign_jwt(42, "USER", "secret", 600).unwrap();
        assert!(verify_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn email_token_round_trips() {
        let token = sign_email_token(7, "secret").unwrap();
        assert_eq!(verify_email_token(&token, "secret").unwrap(), 7);
    }

    #[test]
    fn email_token_is_not_a_session_token() {
        let token = sign_jwt(7, "USER", "secret", 600).unwrap();
        assert!(verify_email_token(&token, "secret").is_err());
    }
}
