// src/middleware.rs

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use sqlx::FromRow;

use crate::{error::AppError, models::user::Role, state::AppState, utils::jwt::verify_jwt};

/// Normalized identity of the caller, resolved once per request by the guard
/// and handed to handlers through request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
}

#[derive(FromRow)]
struct SessionUserRow {
    id: i64,
    name: String,
    email: String,
    role: String,
    email_verified: bool,
}

/// Resolves the Bearer token into the current user.
///
/// The token only carries the user id; the authoritative record (role,
/// verification flag) is re-read from the database so changes take effect
/// on the next request rather than at token expiry.
async fn resolve_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<CurrentUser, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return Err(AppError::Unauthenticated("You are not authorized!".to_string())),
    };

    let claims = verify_jwt(token, &state.config.jwt_secret)?;
    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Unauthenticated("Invalid token".to_string()))?;

    let row = sqlx::query_as::<_, SessionUserRow>(
        "SELECT id, name, email, role, email_verified FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::Unauthenticated("You are not authorized!".to_string()))?;

    let role = Role::parse(&row.role)
        .ok_or_else(|| AppError::Validation(format!("Unrecognized role '{}'", row.role)))?;

    Ok(CurrentUser {
        id: row.id,
        name: row.name,
        email: row.email,
        role,
        email_verified: row.email_verified,
    })
}

/// Role guard middleware.
///
/// Layered per sub-router via
/// `middleware::from_fn_with_state((state, ALLOWED_ROLES), guard)`.
/// An empty allow-list admits any authenticated, verified caller.
/// Every rejection returns before `next.run`, so a failed check can never
/// fall through into the handler.
pub async fn guard(
    State((state, allowed)): State<(AppState, &'static [Role])>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_session(&state, req.headers()).await?;

    if !user.email_verified {
        return Err(AppError::Unverified(
            "Please verify your email first!".to_string(),
        ));
    }

    if !allowed.is_empty() && !allowed.contains(&user.role) {
        return Err(AppError::Forbidden(
            "You don't have permission".to_string(),
        ));
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
