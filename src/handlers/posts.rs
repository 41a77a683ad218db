use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    middleware::CurrentUser,
    models::{
        comment::{COMMENT_COLUMNS, Comment, CommentWithReplies},
        post::{
            CreatePostRequest, FeaturePostRequest, POST_COLUMNS, Post, PostListParams,
            PostStatus, PostWithComments, UpdatePostRequest,
        },
        user::Role,
    },
    utils::{html::clean_html, pagination::Pagination},
};

/// Conjunction of optional listing predicates; each is applied only when the
/// corresponding query parameter was supplied.
#[derive(Debug)]
struct PostFilter {
    search_query: Option<String>,
    tags: Vec<String>,
    is_featured: Option<bool>,
    status: Option<PostStatus>,
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    query.push(" WHERE TRUE");

    if let Some(q) = &filter.search_query {
        query
            .push(" AND (title ILIKE ")
            .push_bind(format!("%{}%", q))
            .push(" OR ")
            .push_bind(q.to_lowercase())
            .push(" = ANY(tags))");
    }

    if !filter.tags.is_empty() {
        query.push(" AND tags @> ").push_bind(filter.tags.clone());
    }

    if let Some(is_featured) = filter.is_featured {
        query.push(" AND is_featured = ").push_bind(is_featured);
    }

    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
}

/// Nests replies under their top-level comment. Input must already be
/// filtered to visible (approved) comments.
fn nest_comments(comments: Vec<Comment>) -> Vec<CommentWithReplies> {
    let mut top_level: Vec<CommentWithReplies> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    let (roots, replies): (Vec<Comment>, Vec<Comment>) = comments
        .into_iter()
        .partition(|c| c.comment_parent_id.is_none());

    for comment in roots {
        index.insert(comment.id, top_level.len());
        top_level.push(CommentWithReplies {
            comment,
            replies: Vec::new(),
        });
    }

    for reply in replies {
        if let Some(parent_id) = reply.comment_parent_id {
            // A reply whose root is not visible stays hidden with it.
            if let Some(&slot) = index.get(&parent_id) {
                top_level[slot].replies.push(reply);
            }
        }
    }

    top_level
}

/// Attaches approved comment trees to a page of posts with a single query.
async fn attach_comments(
    pool: &PgPool,
    posts: Vec<Post>,
) -> Result<Vec<PostWithComments>, AppError> {
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();

    let comments: Vec<Comment> = if ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE post_id = ANY($1) AND status = 'APPROVED' ORDER BY created_at ASC"
        ))
        .bind(&ids)
        .fetch_all(pool)
        .await?
    };

    let mut by_post: HashMap<i64, Vec<Comment>> = HashMap::new();
    for comment in comments {
        by_post.entry(comment.post_id).or_default().push(comment);
    }

    Ok(posts
        .into_iter()
        .map(|post| {
            let nested = nest_comments(by_post.remove(&post.id).unwrap_or_default());
            PostWithComments {
                post,
                comments: nested,
            }
        })
        .collect())
}

/// Create a new post. The caller becomes the author.
pub async fn create_post(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let content = clean_html(&payload.content);
    let tags = payload.tags.unwrap_or_default();
    let status = payload.status.unwrap_or(PostStatus::Draft);

    let post = sqlx::query_as::<_, Post>(&format!(
        "INSERT INTO posts (author_id, title, content, tags, status) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {POST_COLUMNS}"
    ))
    .bind(user.id)
    .bind(&payload.title)
    .bind(&content)
    .bind(&tags)
    .bind(status.as_str())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"msg": "Post created successfully", "data": post})),
    ))
}

/// List posts with optional filtering, pagination and sorting.
/// Each returned post carries its approved comment tree.
pub async fn list_posts(
    State(pool): State<PgPool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let paging = Pagination::new(
        params.page,
        params.limit,
        params.sort_by.as_deref(),
        params.sort_order.as_deref(),
    );

    let tags: Vec<String> = params
        .tags
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let filter = PostFilter {
        search_query: params.search_query,
        tags,
        is_featured: params.is_featured,
        status: params.status,
    };

    let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts");
    push_filters(&mut count_query, &filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(&pool).await?;

    let mut list_query =
        QueryBuilder::<Postgres>::new(format!("SELECT {POST_COLUMNS} FROM posts"));
    push_filters(&mut list_query, &filter);
    list_query
        .push(" ORDER BY ")
        .push(paging.sort_by)
        .push(" ")
        .push(paging.sort_order.as_sql())
        .push(" LIMIT ")
        .push_bind(paging.limit)
        .push(" OFFSET ")
        .push_bind(paging.skip);

    let posts: Vec<Post> = list_query.build_query_as().fetch_all(&pool).await.map_err(|e| {
        tracing::error!("Failed to list posts: {:?}", e);
        AppError::from(e)
    })?;

    let result = attach_comments(&pool, posts).await?;
    let total_page = if total == 0 {
        0
    } else {
        (total + paging.limit - 1) / paging.limit
    };

    Ok(Json(json!({
        "msg": "Posts fetched successfully",
        "data": {
            "result": result,
            "totalData": total,
            "currentPage": paging.page,
            "limit": paging.limit,
            "totalPage": total_page,
        }
    })))
}

/// Fetch a single post by ID.
///
/// The view counter increments with the read: `UPDATE .. RETURNING` makes the
/// bump and the returned row one statement, and the comment reads share its
/// transaction so the whole response is one consistent snapshot.
pub async fn get_post(
    State(pool): State<PgPool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let post = sqlx::query_as::<_, Post>(&format!(
        "UPDATE posts SET views = views + 1 WHERE id = $1 RETURNING {POST_COLUMNS}"
    ))
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("There is no post with this ID: {post_id}")))?;

    let comments = sqlx::query_as::<_, Comment>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments \
         WHERE post_id = $1 AND status = 'APPROVED' ORDER BY created_at ASC"
    ))
    .bind(post_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let data = PostWithComments {
        post,
        comments: nest_comments(comments),
    };

    Ok(Json(json!({"msg": "Post fetched successfully", "data": data})))
}

/// List all posts written by one author, newest first.
pub async fn list_posts_by_author(
    State(pool): State<PgPool>,
    Path(author_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let posts = sqlx::query_as::<_, Post>(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE author_id = $1 ORDER BY created_at DESC"
    ))
    .bind(author_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list posts by author: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({"msg": "Posts fetched successfully", "data": posts})))
}

async fn fetch_author_id(pool: &PgPool, post_id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT author_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("There is no post with this ID: {post_id}")))
}

/// Update a post. Allowed for its author or an admin.
pub async fn update_post(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let author_id = fetch_author_id(&pool, post_id).await?;
    if author_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden(
            "You are not allowed to modify this post".to_string(),
        ));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE posts SET updated_at = NOW()");

    if let Some(title) = payload.title {
        builder.push(", title = ").push_bind(title);
    }
    if let Some(content) = payload.content {
        builder.push(", content = ").push_bind(clean_html(&content));
    }
    if let Some(tags) = payload.tags {
        builder.push(", tags = ").push_bind(tags);
    }
    if let Some(status) = payload.status {
        builder.push(", status = ").push_bind(status.as_str());
    }

    builder.push(" WHERE id = ").push_bind(post_id);
    builder.push(format!(" RETURNING {POST_COLUMNS}"));

    let post: Post = builder.build_query_as().fetch_one(&pool).await.map_err(|e| {
        tracing::error!("Failed to update post: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({"msg": "Post updated successfully", "data": post})))
}

/// Toggle the featured flag. Admin only; re-asserting the current value is a
/// domain error, not a silent success.
pub async fn set_featured(
    State(pool): State<PgPool>,
    Path(post_id): Path<i64>,
    Json(payload): Json<FeaturePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current: bool = sqlx::query_scalar("SELECT is_featured FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("There is no post with this ID: {post_id}")))?;

    if current == payload.is_featured {
        return Err(AppError::Conflict(
            "The requested isFeatured value is the same as the current one".to_string(),
        ));
    }

    let post = sqlx::query_as::<_, Post>(&format!(
        "UPDATE posts SET is_featured = $1, updated_at = NOW() WHERE id = $2 RETURNING {POST_COLUMNS}"
    ))
    .bind(payload.is_featured)
    .bind(post_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({"msg": "Post feature flag updated successfully", "data": post})))
}

/// Delete a post. Allowed for its author or an admin.
pub async fn delete_post(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = fetch_author_id(&pool, post_id).await?;
    if author_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this post".to_string(),
        ));
    }

    let post = sqlx::query_as::<_, Post>(&format!(
        "DELETE FROM posts WHERE id = $1 RETURNING {POST_COLUMNS}"
    ))
    .bind(post_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to delete post: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({"msg": "Post deleted successfully", "data": post})))
}

/// Aggregate statistics for the admin dashboard.
///
/// All counts run inside one transaction so the numbers are a consistent
/// snapshot, not a smear across concurrent writes.
pub async fn stats(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let total_posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&mut *tx)
        .await?;
    let published_posts: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE status = 'PUBLISHED'")
            .fetch_one(&mut *tx)
            .await?;
    let draft_posts: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE status = 'DRAFT'")
            .fetch_one(&mut *tx)
            .await?;
    let archived_posts: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE status = 'ARCHIVED'")
            .fetch_one(&mut *tx)
            .await?;
    let featured_posts: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE is_featured = TRUE")
            .fetch_one(&mut *tx)
            .await?;
    let total_views: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(views), 0)::BIGINT FROM posts")
            .fetch_one(&mut *tx)
            .await?;

    let total_comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(&mut *tx)
        .await?;
    let pending_comments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE status = 'PENDING'")
            .fetch_one(&mut *tx)
            .await?;
    let approved_comments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE status = 'APPROVED'")
            .fetch_one(&mut *tx)
            .await?;

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "msg": "Stats fetched successfully",
        "data": {
            "posts": {
                "total": total_posts,
                "published": published_posts,
                "draft": draft_posts,
                "archived": archived_posts,
                "featured": featured_posts,
                "totalViews": total_views,
            },
            "comments": {
                "total": total_comments,
                "pending": pending_comments,
                "approved": approved_comments,
            },
            "users": {
                "total": total_users,
            },
        }
    })))
}
