use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    middleware::CurrentUser,
    models::user::{Role, USER_COLUMNS, UpdatePasswordRequest, UpdateUserRequest, User},
    utils::hash::{hash_password, verify_password},
};

/// Users may only touch their own record; admins may touch anyone's.
fn ensure_self_or_admin(user: &CurrentUser, target_id: i64) -> Result<(), AppError> {
    if user.id != target_id && user.role != Role::Admin {
        return Err(AppError::Forbidden(
            "You are not allowed to access other users' resources".to_string(),
        ));
    }
    Ok(())
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY id DESC"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({"msg": "Users fetched successfully", "data": users})))
}

/// Fetch one user. Self or admin.
pub async fn get_user(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self_or_admin(&user, user_id)?;

    let target = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("There is no user with this ID: {user_id}")))?;

    Ok(Json(json!({"msg": "User fetched successfully", "data": target})))
}

/// Update profile fields. Self or admin.
pub async fn update_user(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_self_or_admin(&user, user_id)?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE users SET updated_at = NOW()");

    if let Some(name) = payload.name {
        builder.push(", name = ").push_bind(name);
    }
    if let Some(phone_number) = payload.phone_number {
        builder.push(", phone_number = ").push_bind(phone_number);
    }

    builder.push(" WHERE id = ").push_bind(user_id);
    builder.push(format!(" RETURNING {USER_COLUMNS}"));

    let updated: User = builder
        .build_query_as()
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("There is no user with this ID: {user_id}")))?;

    Ok(Json(json!({"msg": "User updated successfully", "data": updated})))
}

/// Change a password.
///
/// Two deliberately different paths: the self-service path proves knowledge
/// of the current password and rejects a no-op change; the admin-on-behalf
/// path overwrites directly with no current-password check.
pub async fn update_password(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_self_or_admin(&user, user_id)?;

    if user.id == user_id {
        let current_password = payload
            .current_password
            .as_deref()
            .ok_or_else(|| AppError::Validation("Current password is required".to_string()))?;

        let stored_hash: String = sqlx::query_scalar("SELECT password FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

        if !verify_password(current_password, &stored_hash)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        if payload.new_password == current_password {
            return Err(AppError::Conflict(
                "New password cannot be the same as the current password".to_string(),
            ));
        }
    } else {
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("There is no user with this ID: {user_id}"))
            })?;
    }

    let hashed = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
        .bind(&hashed)
        .bind(user_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({"msg": "Password updated successfully", "data": null})))
}

/// Delete a user and, through FK cascades, their posts and comments.
/// Self or admin.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self_or_admin(&user, user_id)?;

    let deleted = sqlx::query_as::<_, User>(&format!(
        "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("There is no user with this ID: {user_id}")))?;

    Ok(Json(json!({"msg": "User deleted successfully", "data": deleted})))
}
