// tests/api_tests.rs

use blog_backend::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL and a pool for direct fixture tweaks, or None when
/// DATABASE_URL is not set (the test is skipped).
async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        port: 0,
        admin_email: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some((address, pool))
}

/// Registers a user, marks it verified with the requested role, logs in.
/// Returns (bearer token, user id).
async fn register_verified_user(
    client: &reqwest::Client,
    address: &str,
    pool: &PgPool,
    role: &str,
) -> (String, i64) {
    let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let register = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Test User",
            "email": email,
            "password": password
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(register.status().as_u16(), 201);

    let body: serde_json::Value = register.json().await.expect("parse register json");
    let user_id = body["data"]["id"].as_i64().expect("user id");

    sqlx::query("UPDATE users SET email_verified = TRUE, role = $1 WHERE email = $2")
        .bind(role)
        .bind(&email)
        .execute(pool)
        .await
        .unwrap();

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("parse login json");

    let token = login["data"]["token"].as_str().expect("token").to_string();

    (token, user_id)
}

async fn create_post(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    payload: serde_json::Value,
) -> serde_json::Value {
    let resp = client
        .post(format!("{}/post", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&payload)
        .send()
        .await
        .expect("Create post failed");
    assert_eq!(resp.status().as_u16(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["data"].clone()
}

#[tokio::test]
async fn unknown_route_is_404() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Fresh User",
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["emailVerified"], false);
    assert_eq!(body["data"]["role"], "USER");
    // The hash must never appear in any response.
    assert!(body["data"].get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);

    // Password is too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Short Password",
            "email": email,
            "password": "pw"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);
    let payload = serde_json::json!({
        "name": "First",
        "email": email,
        "password": "password123"
    });

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn create_post_requires_authentication() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/post", address))
        .json(&serde_json::json!({"title": "T", "content": "C"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn unverified_user_is_rejected() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Unverified",
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();

    // Login works, but guarded routes reject until the email is confirmed.
    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"email": email, "password": "password123"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = login["data"]["token"].as_str().unwrap();

    let response = client
        .post(format!("{}/post", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"title": "T", "content": "C"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn verify_email_unlocks_guarded_routes() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);

    let register: serde_json::Value = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Verifies Later",
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let user_id = register["data"]["id"].as_i64().unwrap();

    // The same token the registration flow hands to the mailer.
    let token =
        blog_backend::utils::jwt::sign_email_token(user_id, "test_secret_for_integration_tests")
            .unwrap();

    let verify = client
        .get(format!("{}/api/auth/verify-email?token={}", address, token))
        .send()
        .await
        .unwrap();
    assert_eq!(verify.status().as_u16(), 200);

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"email": email, "password": "password123"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(login["data"]["emailVerified"], true);
    let session = login["data"]["token"].as_str().unwrap();

    let response = client
        .post(format!("{}/post", address))
        .header("Authorization", format!("Bearer {}", session))
        .json(&serde_json::json!({"title": "Now verified", "content": "body"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // Garbage tokens are rejected outright.
    let bogus = client
        .get(format!("{}/api/auth/verify-email?token=not-a-token", address))
        .send()
        .await
        .unwrap();
    assert_eq!(bogus.status().as_u16(), 400);
}

#[tokio::test]
async fn author_listing_returns_their_posts() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (token_a, id_a) = register_verified_user(&client, &address, &pool, "USER").await;
    let (token_b, _) = register_verified_user(&client, &address, &pool, "USER").await;

    for i in 1..=2 {
        create_post(
            &client,
            &address,
            &token_a,
            serde_json::json!({"title": format!("A Post {}", i), "content": "body"}),
        )
        .await;
    }

    // Any authenticated user may browse an author's posts.
    let listing: serde_json::Value = client
        .get(format!("{}/post/author/{}", address, id_a))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let posts = listing["data"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p["authorId"].as_i64() == Some(id_a)));

    // Unauthenticated callers are not.
    let anonymous = client
        .get(format!("{}/post/author/{}", address, id_a))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);
}

#[tokio::test]
async fn view_counter_increments_once_per_fetch() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (token, _) = register_verified_user(&client, &address, &pool, "USER").await;

    let post = create_post(
        &client,
        &address,
        &token,
        serde_json::json!({"title": "View Counter", "content": "body", "tags": ["x"]}),
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();
    assert_eq!(post["views"], 0);

    let first: serde_json::Value = client
        .get(format!("{}/post/{}", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["data"]["views"], 1);

    let second: serde_json::Value = client
        .get(format!("{}/post/{}", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["data"]["views"], 2);
}

#[tokio::test]
async fn non_author_cannot_update_post() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (token_a, _) = register_verified_user(&client, &address, &pool, "USER").await;
    let (token_b, _) = register_verified_user(&client, &address, &pool, "USER").await;

    let post = create_post(
        &client,
        &address,
        &token_a,
        serde_json::json!({"title": "Owned by A", "content": "body"}),
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();

    let response = client
        .patch(format!("{}/post/{}", address, post_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({"title": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // The post is unchanged.
    let title: String = sqlx::query_scalar("SELECT title FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "Owned by A");
}

#[tokio::test]
async fn admin_can_update_any_post() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (token_a, _) = register_verified_user(&client, &address, &pool, "USER").await;
    let (token_admin, _) = register_verified_user(&client, &address, &pool, "ADMIN").await;

    let post = create_post(
        &client,
        &address,
        &token_a,
        serde_json::json!({"title": "Before", "content": "body"}),
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();

    let response = client
        .patch(format!("{}/post/{}", address, post_id))
        .header("Authorization", format!("Bearer {}", token_admin))
        .json(&serde_json::json!({"title": "After", "status": "PUBLISHED"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["title"], "After");
    assert_eq!(body["data"]["status"], "PUBLISHED");
}

#[tokio::test]
async fn feature_flag_is_admin_only_and_noop_conflicts() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (token_user, _) = register_verified_user(&client, &address, &pool, "USER").await;
    let (token_admin, _) = register_verified_user(&client, &address, &pool, "ADMIN").await;

    let post = create_post(
        &client,
        &address,
        &token_user,
        serde_json::json!({"title": "Feature me", "content": "body"}),
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();

    // Non-admin is rejected by the guard.
    let forbidden = client
        .patch(format!("{}/post/{}/isFeatured", address, post_id))
        .header("Authorization", format!("Bearer {}", token_user))
        .json(&serde_json::json!({"isFeatured": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let ok = client
        .patch(format!("{}/post/{}/isFeatured", address, post_id))
        .header("Authorization", format!("Bearer {}", token_admin))
        .json(&serde_json::json!({"isFeatured": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);

    // Re-asserting the current value is a domain error.
    let noop = client
        .patch(format!("{}/post/{}/isFeatured", address, post_id))
        .header("Authorization", format!("Bearer {}", token_admin))
        .json(&serde_json::json!({"isFeatured": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(noop.status().as_u16(), 409);
}

#[tokio::test]
async fn listing_filters_and_paginates() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (token, _) = register_verified_user(&client, &address, &pool, "USER").await;

    // Unique tag so the assertions stay stable against concurrent tests.
    let tag = format!("tag-{}", &uuid::Uuid::new_v4().to_string()[..8]);
    for i in 1..=3 {
        create_post(
            &client,
            &address,
            &token,
            serde_json::json!({
                "title": format!("Filtered {} {}", tag, i),
                "content": "body",
                "tags": [tag],
                "status": "PUBLISHED"
            }),
        )
        .await;
    }

    let page: serde_json::Value = client
        .get(format!(
            "{}/post?tags={}&limit=2&page=1&sortBy=createdAt&sortOrder=desc",
            address, tag
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(page["data"]["totalData"], 3);
    assert_eq!(page["data"]["totalPage"], 2);
    assert_eq!(page["data"]["currentPage"], 1);
    assert_eq!(page["data"]["result"].as_array().unwrap().len(), 2);

    // searchQuery matches lowercased tags too.
    let by_search: serde_json::Value = client
        .get(format!("{}/post?searchQuery={}", address, tag))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_search["data"]["totalData"], 3);

    // A tag nobody used matches nothing, with an empty 200 body.
    let empty: serde_json::Value = client
        .get(format!("{}/post?tags={}", address, "tag-that-nobody-used"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty["data"]["totalData"], 0);
    assert_eq!(empty["data"]["totalPage"], 0);
    assert_eq!(empty["data"]["result"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn stats_is_admin_only() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (token_user, _) = register_verified_user(&client, &address, &pool, "USER").await;
    let (token_admin, _) = register_verified_user(&client, &address, &pool, "ADMIN").await;

    let forbidden = client
        .get(format!("{}/post/stats", address))
        .header("Authorization", format!("Bearer {}", token_user))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let ok = client
        .get(format!("{}/post/stats", address))
        .header("Authorization", format!("Bearer {}", token_admin))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);

    let body: serde_json::Value = ok.json().await.unwrap();
    assert!(body["data"]["posts"]["total"].as_i64().unwrap() >= 0);
    assert!(body["data"]["users"]["total"].as_i64().unwrap() >= 2);
}
