//! Shared helpers for API integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use sqlx::PgPool;
use stagehand_core::plans::EnforcementMode;
use tower::ServiceExt;

use stagehand_api::auth::jwt::{generate_access_token, JwtConfig};
use stagehand_api::config::ServerConfig;
use stagehand_api::router::build_app_router;
use stagehand_api::state::AppState;
use stagehand_events::EventBus;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(quota_mode: EnforcementMode) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        quota_mode,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_mode(pool, EnforcementMode::Soft)
}

pub fn build_test_app_with_mode(pool: PgPool, quota_mode: EnforcementMode) -> Router {
    let config = test_config(quota_mode);
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::new(EventBus::default()),
    };
    build_app_router(state, &config)
}

/// A tenant/user pair seeded straight into the database, with a signed
/// access token for the user.
pub struct TestIdentity {
    pub tenant_id: i64,
    pub user_id: i64,
    pub token: String,
}

/// Seed a tenant and one member user, returning a bearer token scoped to
/// the tenant.
pub async fn seed_identity(pool: &PgPool, slug: &str, plan: &str) -> TestIdentity {
    let (tenant_id,): (i64,) =
        sqlx::query_as("INSERT INTO tenants (slug, name, plan) VALUES ($1, $1, $2) RETURNING id")
            .bind(slug)
            .bind(plan)
            .fetch_one(pool)
            .await
            .unwrap();
    let (user_id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (tenant_id, email) VALUES ($1, $2 || '@example.com') RETURNING id",
    )
    .bind(tenant_id)
    .bind(slug)
    .fetch_one(pool)
    .await
    .unwrap();

    let config = test_config(EnforcementMode::Soft);
    let token = generate_access_token(user_id, tenant_id, "member", &config.jwt).unwrap();

    TestIdentity {
        tenant_id,
        user_id,
        token,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send_json(app, "POST", uri, token, body).await
}

/// Read the full response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert a status and return the parsed body in one step.
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
