//! Integration tests for the thread, human-request, and usage HTTP surface.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{expect_json, get_auth, post_json, seed_identity, send_json, TestIdentity};
use serde_json::json;
use sqlx::PgPool;
use stagehand_core::plans::EnforcementMode;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a deployed agent via the API and return its id.
async fn seed_deployed_resource(pool: &PgPool, identity: &TestIdentity) -> i64 {
    let created = post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/resources",
        &identity.token,
        json!({"kind": "agent", "slug": "bot", "name": "Bot"}),
    )
    .await;
    let created = expect_json(created, StatusCode::CREATED).await;
    let id = created["data"]["id"].as_i64().unwrap();

    let deployed = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/resources/{id}/deploy"),
        &identity.token,
        json!({"bump": "patch"}),
    )
    .await;
    assert_eq!(deployed.status(), StatusCode::CREATED);
    id
}

async fn start_thread(pool: &PgPool, identity: &TestIdentity, resource_id: i64) -> i64 {
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/threads",
        &identity.token,
        json!({"resource_id": resource_id, "payload": {"message": "hi"}}),
    )
    .await;
    let json = expect_json(response, StatusCode::CREATED).await;
    json["data"]["id"].as_i64().unwrap()
}

/// Pin the tenant's current usage period to a limit of 1 run. The lazy
/// insert in the metering path uses ON CONFLICT DO NOTHING, so this row
/// survives.
async fn seed_tiny_quota(pool: &PgPool, tenant_id: i64) {
    let period_start =
        stagehand_db::repositories::usage_repo::period_start_for(Utc::now().date_naive(), None);
    sqlx::query(
        "INSERT INTO usage_periods (tenant_id, period_start, run_limit) VALUES ($1, $2, 1)",
    )
    .bind(tenant_id)
    .bind(period_start)
    .execute(pool)
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Test: Thread creation is metered
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_thread_records_usage(pool: PgPool) {
    let identity = seed_identity(&pool, "acme", "pro").await;
    let resource_id = seed_deployed_resource(&pool, &identity).await;

    let thread_id = start_thread(&pool, &identity, resource_id).await;
    assert!(thread_id > 0);

    let usage = get_auth(
        common::build_test_app(pool),
        "/api/v1/usage/current",
        &identity.token,
    )
    .await;
    let usage = expect_json(usage, StatusCode::OK).await;
    assert_eq!(usage["data"]["run_count"], 1);
    assert_eq!(usage["data"]["run_type_counts"], json!({"agent": 1}));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn hard_quota_returns_429(pool: PgPool) {
    let identity = seed_identity(&pool, "acme", "free").await;
    let resource_id = seed_deployed_resource(&pool, &identity).await;
    seed_tiny_quota(&pool, identity.tenant_id).await;

    let app = || common::build_test_app_with_mode(pool.clone(), EnforcementMode::Hard);

    let first = post_json(
        app(),
        "/api/v1/threads",
        &identity.token,
        json!({"resource_id": resource_id}),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = post_json(
        app(),
        "/api/v1/threads",
        &identity.token,
        json!({"resource_id": resource_id}),
    )
    .await;
    let json = expect_json(second, StatusCode::TOO_MANY_REQUESTS).await;
    assert_eq!(json["code"], "RESOURCE_LIMIT");
    assert_eq!(json["kind"], "run");
    assert_eq!(json["limit"], 1);
    assert_eq!(json["plan"], "free");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn soft_quota_meters_paid_plan_as_overage(pool: PgPool) {
    let identity = seed_identity(&pool, "acme", "starter").await;
    let resource_id = seed_deployed_resource(&pool, &identity).await;
    seed_tiny_quota(&pool, identity.tenant_id).await;

    for _ in 0..2 {
        let response = post_json(
            common::build_test_app(pool.clone()),
            "/api/v1/threads",
            &identity.token,
            json!({"resource_id": resource_id}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let usage = get_auth(
        common::build_test_app(pool),
        "/api/v1/usage/current",
        &identity.token,
    )
    .await;
    let usage = expect_json(usage, StatusCode::OK).await;
    assert_eq!(usage["data"]["run_count"], 2);
    assert_eq!(usage["data"]["overage_count"], 1);
}

// ---------------------------------------------------------------------------
// Test: Status transitions over HTTP
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn invalid_transition_returns_400_with_both_states(pool: PgPool) {
    let identity = seed_identity(&pool, "acme", "pro").await;
    let resource_id = seed_deployed_resource(&pool, &identity).await;
    let thread_id = start_thread(&pool, &identity, resource_id).await;

    let cancelled = send_json(
        common::build_test_app(pool.clone()),
        "PATCH",
        &format!("/api/v1/threads/{thread_id}/status"),
        &identity.token,
        json!({"status": "cancelled"}),
    )
    .await;
    assert_eq!(cancelled.status(), StatusCode::OK);

    let response = send_json(
        common::build_test_app(pool),
        "PATCH",
        &format!("/api/v1/threads/{thread_id}/status"),
        &identity.token,
        json!({"status": "running"}),
    )
    .await;
    let json = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(
        json["error"],
        "Invalid status transition from cancelled to running"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reply_restarts_completed_thread(pool: PgPool) {
    let identity = seed_identity(&pool, "acme", "pro").await;
    let resource_id = seed_deployed_resource(&pool, &identity).await;
    let thread_id = start_thread(&pool, &identity, resource_id).await;

    send_json(
        common::build_test_app(pool.clone()),
        "PATCH",
        &format!("/api/v1/threads/{thread_id}/status"),
        &identity.token,
        json!({"status": "completed", "result": {"answer": 42}}),
    )
    .await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/threads/{thread_id}/reply"),
        &identity.token,
        json!({"content": {"text": "one more thing"}}),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["data"]["action"], "restart");
    assert_eq!(json["data"]["status"], "running");

    let thread = get_auth(
        common::build_test_app(pool),
        &format!("/api/v1/threads/{thread_id}"),
        &identity.token,
    )
    .await;
    let thread = expect_json(thread, StatusCode::OK).await;
    assert_eq!(thread["data"]["status"], "running");
}

// ---------------------------------------------------------------------------
// Test: Engine callbacks carry the thread seq
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn runs_and_output_items_are_sequenced(pool: PgPool) {
    let identity = seed_identity(&pool, "acme", "pro").await;
    let resource_id = seed_deployed_resource(&pool, &identity).await;
    let thread_id = start_thread(&pool, &identity, resource_id).await;

    let run = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/threads/{thread_id}/runs"),
        &identity.token,
        json!({"input": {"message": "hi"}}),
    )
    .await;
    let run = expect_json(run, StatusCode::CREATED).await;
    let run_id = run["data"]["id"].as_i64().unwrap();
    assert_eq!(run["data"]["seq"], 1);
    assert_eq!(run["data"]["run_type"], "agent");

    let item = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/threads/{thread_id}/output-items"),
        &identity.token,
        json!({"run_id": run_id, "content": {"text": "thinking"}}),
    )
    .await;
    let item = expect_json(item, StatusCode::CREATED).await;
    assert_eq!(item["data"]["seq"], 2);

    let finished = send_json(
        common::build_test_app(pool.clone()),
        "PATCH",
        &format!("/api/v1/runs/{run_id}"),
        &identity.token,
        json!({"status": "completed", "output": {"text": "done"}}),
    )
    .await;
    let finished = expect_json(finished, StatusCode::OK).await;
    assert_eq!(finished["data"]["seq"], 3);
    assert_eq!(finished["data"]["status"], "completed");

    // Pollers can resume from a known seq.
    let tail = get_auth(
        common::build_test_app(pool),
        &format!("/api/v1/threads/{thread_id}/output-items?since_seq=1"),
        &identity.token,
    )
    .await;
    let tail = expect_json(tail, StatusCode::OK).await;
    assert_eq!(tail["data"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: Human requests over HTTP
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn human_request_lifecycle(pool: PgPool) {
    let identity = seed_identity(&pool, "acme", "pro").await;
    let resource_id = seed_deployed_resource(&pool, &identity).await;
    let thread_id = start_thread(&pool, &identity, resource_id).await;

    let request = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/threads/{thread_id}/human-requests"),
        &identity.token,
        json!({"kind": "approval", "prompt": {"action": "wire $500"}}),
    )
    .await;
    let request = expect_json(request, StatusCode::CREATED).await;
    let request_id = request["data"]["id"].as_i64().unwrap();
    assert_eq!(request["data"]["status"], "pending");

    let pending = get_auth(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/threads/{thread_id}/human-requests/pending"),
        &identity.token,
    )
    .await;
    let pending = expect_json(pending, StatusCode::OK).await;
    assert_eq!(pending["data"]["id"], request_id);

    let outcome = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/human-requests/{request_id}/respond"),
        &identity.token,
        json!({"status": "approved", "payload": {"note": "ok"}}),
    )
    .await;
    let outcome = expect_json(outcome, StatusCode::OK).await;
    assert_eq!(outcome["data"]["already_decided"], false);
    assert_eq!(outcome["data"]["request_status"], "responded");
    // The bearer identity is attributed as the responder.
    assert_eq!(
        outcome["data"]["response"]["responded_by"],
        identity.user_id
    );

    // A retry observes the decision without writing.
    let retry = post_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/human-requests/{request_id}/respond"),
        &identity.token,
        json!({"status": "rejected"}),
    )
    .await;
    let retry = expect_json(retry, StatusCode::OK).await;
    assert_eq!(retry["data"]["already_decided"], true);
    assert!(retry["data"]["response"].is_null());

    // No live request remains.
    let pending = get_auth(
        common::build_test_app(pool),
        &format!("/api/v1/threads/{thread_id}/human-requests/pending"),
        &identity.token,
    )
    .await;
    let pending = expect_json(pending, StatusCode::OK).await;
    assert!(pending["data"].is_null());
}
