use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::comment::CommentWithReplies;

/// Column list shared by every query that materializes a full `Post`.
pub const POST_COLUMNS: &str =
    "id, author_id, title, content, tags, status, is_featured, views, created_at, updated_at";

/// Post lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "DRAFT",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Archived => "ARCHIVED",
        }
    }
}

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,

    /// 'DRAFT', 'PUBLISHED' or 'ARCHIVED'.
    pub status: String,

    pub is_featured: bool,

    /// Monotonic read counter, bumped once per fetch-by-id.
    pub views: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 50000,
        message = "Content length must be between 1 and 50000 chars"
    ))]
    pub content: String,

    pub tags: Option<Vec<String>>,

    pub status: Option<PostStatus>,
}

/// DTO for updating a post. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 50000))]
    pub content: Option<String>,

    pub tags: Option<Vec<String>>,

    pub status: Option<PostStatus>,
}

/// DTO for the admin-only feature toggle.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePostRequest {
    pub is_featured: bool,
}

/// Query parameters for the post listing endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,

    /// Case-insensitive title substring OR exact tag match.
    pub search_query: Option<String>,

    /// Comma-separated list; posts must carry every requested tag.
    pub tags: Option<String>,

    pub is_featured: Option<bool>,

    pub status: Option<PostStatus>,
}

/// A post together with its approved comment tree (one level deep).
#[derive(Debug, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<CommentWithReplies>,
}
