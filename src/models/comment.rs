use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Column list shared by every query that materializes a full `Comment`.
pub const COMMENT_COLUMNS: &str =
    "id, comment, user_id, post_id, comment_parent_id, status, created_at, updated_at";

/// Moderation status of a comment. New comments start PENDING and stay
/// invisible to ordinary reads until approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommentStatus {
    Pending,
    Approved,
    Reject,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "PENDING",
            CommentStatus::Approved => "APPROVED",
            CommentStatus::Reject => "REJECT",
        }
    }
}

/// Represents the 'comments' table in the database.
///
/// `comment_parent_id` is always null or the id of a true top-level comment;
/// replies never nest deeper than one level.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub comment: String,
    pub user_id: i64,
    pub post_id: i64,
    pub comment_parent_id: Option<i64>,

    /// 'PENDING', 'APPROVED' or 'REJECT'.
    pub status: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub comment: String,

    pub post_id: i64,

    /// Optional: the ID of the comment being replied to.
    pub comment_parent_id: Option<i64>,
}

/// DTO for editing a comment body.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub comment: String,
}

/// DTO for the admin moderation endpoint.
#[derive(Debug, Deserialize)]
pub struct UpdateCommentStatusRequest {
    pub status: CommentStatus,
}

/// A top-level comment with its approved replies.
#[derive(Debug, Serialize)]
pub struct CommentWithReplies {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}
