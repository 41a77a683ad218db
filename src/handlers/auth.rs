// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, USER_COLUMNS, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{sign_email_token, sign_jwt, verify_email_token},
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it. The account starts
/// unverified; a verification token is issued for the mail pipeline.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, password, phone_number) \
         VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
    ))
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&hashed_password)
    .bind(&payload.phone_number)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Postgres error code for unique violation is 23505
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Email '{}' is already registered", payload.email))
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    let token = sign_email_token(user.id, &config.jwt_secret)?;
    // Mail delivery runs out of process; surface the token for the mailer.
    tracing::info!(
        "verification token issued for {}: /api/auth/verify-email?token={}",
        user.email,
        token
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "msg": "User registered successfully. Please verify your email.",
            "data": user,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailParams {
    pub token: String,
}

/// Marks the account named by the verification token as verified.
pub async fn verify_email(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = verify_email_token(&params.token, &config.jwt_secret)?;

    let result =
        sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({
        "msg": "Email verified successfully",
        "data": null,
    })))
}

/// Authenticates a user and returns a Bearer JWT.
///
/// Verification status is not checked here: unverified accounts can log in
/// but every guarded route rejects them until the email is confirmed.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::Internal(e.to_string())
    })?;

    let user =
        user.ok_or_else(|| AppError::Unauthenticated("Invalid email or password".to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password)?;

    if !is_valid {
        return Err(AppError::Unauthenticated(
            "Invalid email or password".to_string(),
        ));
    }

    let token = sign_jwt(
        user.id,
        &user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "msg": "Logged in successfully",
        "data": {
            "token": token,
            "type": "Bearer",
            "emailVerified": user.email_verified,
        }
    })))
}
