// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, comments, posts, users},
    middleware::guard,
    models::user::Role,
    state::AppState,
};

const USER_OR_ADMIN: &[Role] = &[Role::User, Role::Admin];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, posts, comments, users).
/// * Role gates are applied per route group via the guard middleware.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool + config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-email", get(auth::verify_email));

    // Listing and fetch-by-id are public; everything else is role-gated.
    // "/stats" wins over "/{post_id}" by static-segment precedence.
    let post_routes = Router::new()
        .route("/", get(posts::list_posts))
        .route("/{post_id}", get(posts::get_post))
        .merge(
            Router::new()
                .route("/", post(posts::create_post))
                .route("/author/{author_id}", get(posts::list_posts_by_author))
                .route(
                    "/{post_id}",
                    patch(posts::update_post).delete(posts::delete_post),
                )
                .layer(from_fn_with_state((state.clone(), USER_OR_ADMIN), guard)),
        )
        .merge(
            Router::new()
                .route("/stats", get(posts::stats))
                .route("/{post_id}/isFeatured", patch(posts::set_featured))
                .layer(from_fn_with_state((state.clone(), ADMIN_ONLY), guard)),
        );

    let comment_routes = Router::new()
        .merge(
            Router::new()
                .route("/", post(comments::create_comment))
                .route(
                    "/{comment_id}",
                    patch(comments::update_comment).delete(comments::delete_comment),
                )
                .layer(from_fn_with_state((state.clone(), USER_OR_ADMIN), guard)),
        )
        .merge(
            Router::new()
                .route("/{comment_id}/status", patch(comments::update_comment_status))
                .route("/allComments", get(comments::list_all_comments))
                .layer(from_fn_with_state((state.clone(), ADMIN_ONLY), guard)),
        );

    let user_routes = Router::new()
        .merge(
            Router::new()
                .route("/", get(users::list_users))
                .layer(from_fn_with_state((state.clone(), ADMIN_ONLY), guard)),
        )
        .merge(
            Router::new()
                .route(
                    "/{user_id}",
                    get(users::get_user)
                        .patch(users::update_user)
                        .delete(users::delete_user),
                )
                .route("/{user_id}/password", patch(users::update_password))
                .layer(from_fn_with_state((state.clone(), USER_OR_ADMIN), guard)),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/post", post_routes)
        .nest("/comments", comment_routes)
        .nest("/users", user_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
