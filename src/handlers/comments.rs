use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::{
    error::AppError,
    middleware::CurrentUser,
    models::comment::{
        COMMENT_COLUMNS, Comment, CreateCommentRequest, UpdateCommentRequest,
        UpdateCommentStatusRequest,
    },
    utils::html::clean_html,
};

#[derive(FromRow)]
struct ParentRow {
    id: i64,
    comment_parent_id: Option<i64>,
}

/// Create a new comment, flattening replies-to-replies.
///
/// If the declared parent is itself a reply, the new comment attaches to
/// that reply's top-level ancestor, so `comment_parent_id` never points more
/// than one level deep.
pub async fn create_comment(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE id = $1")
        .bind(payload.post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("There is no post with this ID: {}", payload.post_id))
        })?;

    let mut parent_id: Option<i64> = None;
    if let Some(requested) = payload.comment_parent_id {
        let parent = sqlx::query_as::<_, ParentRow>(
            "SELECT id, comment_parent_id FROM comments WHERE id = $1",
        )
        .bind(requested)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("There is no comment with this ID: {requested}"))
        })?;

        parent_id = Some(parent.comment_parent_id.unwrap_or(parent.id));
    }

    let comment = sqlx::query_as::<_, Comment>(&format!(
        "INSERT INTO comments (comment, user_id, post_id, comment_parent_id) \
         VALUES ($1, $2, $3, $4) RETURNING {COMMENT_COLUMNS}"
    ))
    .bind(clean_html(&payload.comment))
    .bind(user.id)
    .bind(payload.post_id)
    .bind(parent_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"msg": "Comment created successfully", "data": comment})),
    ))
}

/// Edit a comment body.
pub async fn update_comment(
    State(pool): State<PgPool>,
    Path(comment_id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let comment = sqlx::query_as::<_, Comment>(&format!(
        "UPDATE comments SET comment = $1, updated_at = NOW() WHERE id = $2 \
         RETURNING {COMMENT_COLUMNS}"
    ))
    .bind(clean_html(&payload.comment))
    .bind(comment_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("There is no comment with this ID: {comment_id}")))?;

    Ok(Json(json!({"msg": "Comment updated successfully", "data": comment})))
}

/// Moderate a comment. Admin only; re-asserting the current status is a
/// domain error, not a silent success.
pub async fn update_comment_status(
    State(pool): State<PgPool>,
    Path(comment_id): Path<i64>,
    Json(payload): Json<UpdateCommentStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current: String = sqlx::query_scalar("SELECT status FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("There is no comment with this ID: {comment_id}"))
        })?;

    if current == payload.status.as_str() {
        return Err(AppError::Conflict(
            "The provided status is the same as the current status".to_string(),
        ));
    }

    let comment = sqlx::query_as::<_, Comment>(&format!(
        "UPDATE comments SET status = $1, updated_at = NOW() WHERE id = $2 \
         RETURNING {COMMENT_COLUMNS}"
    ))
    .bind(payload.status.as_str())
    .bind(comment_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({"msg": "Comment status updated successfully", "data": comment})))
}

/// Delete a comment. Replies go with their top-level comment (FK cascade).
pub async fn delete_comment(
    State(pool): State<PgPool>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = sqlx::query_as::<_, Comment>(&format!(
        "DELETE FROM comments WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
    ))
    .bind(comment_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("There is no comment with this ID: {comment_id}")))?;

    Ok(Json(json!({"msg": "Comment deleted successfully", "data": comment})))
}

/// Full moderation view: every comment regardless of status, newest first.
/// Admin only.
pub async fn list_all_comments(
    State(pool): State<PgPool>,
) -> Result<impl IntoResponse, AppError> {
    let comments = sqlx::query_as::<_, Comment>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments ORDER BY created_at DESC"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list comments: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({"msg": "Comments fetched successfully", "data": comments})))
}
