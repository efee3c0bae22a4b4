//! Integration tests for per-tenant usage metering.
//!
//! - Lazy period row creation with the limit frozen at creation
//! - Hard-mode rejection at the limit
//! - Soft-mode overage metering on paid plans
//! - Decrement compensation clamping at zero

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use stagehand_core::plans::EnforcementMode;
use stagehand_db::models::tenant::CreateTenant;
use stagehand_db::repositories::usage_repo::period_start_for;
use stagehand_db::repositories::{TenantRepo, UsageRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_tenant(pool: &PgPool, slug: &str, plan: &str) -> i64 {
    TenantRepo::create(
        pool,
        &CreateTenant {
            slug: slug.to_string(),
            name: slug.to_string(),
            plan: Some(plan.to_string()),
        },
    )
    .await
    .unwrap()
    .id
}

/// Pre-create the tenant's current period row with a tiny limit, so tests
/// can hit the quota boundary without a hundred inserts. The repository's
/// lazy insert uses ON CONFLICT DO NOTHING, so this row survives.
async fn seed_period_with_limit(pool: &PgPool, tenant_id: i64, run_limit: i64) {
    let period_start = period_start_for(Utc::now().date_naive(), None);
    sqlx::query(
        "INSERT INTO usage_periods (tenant_id, period_start, run_limit)
         VALUES ($1, $2, $3)",
    )
    .bind(tenant_id)
    .bind(period_start)
    .bind(run_limit)
    .execute(pool)
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Test: Lazy period creation and counting
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_first_check_creates_period(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "free").await;

    assert!(UsageRepo::current_period(&pool, tenant_id).await.unwrap().is_none());

    let check = UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard)
        .await
        .unwrap();
    assert!(check.allowed);
    assert!(!check.overage);
    assert_eq!(check.current, 1);
    assert_eq!(check.limit, Some(100)); // free plan monthly runs

    let period = UsageRepo::current_period(&pool, tenant_id)
        .await
        .unwrap()
        .expect("Period row should now exist");
    assert_eq!(period.run_count, 1);
    assert_eq!(period.run_limit, Some(100));
    assert_eq!(period.overage_count, 0);
    assert_eq!(period.run_type_counts, json!({"agent": 1}));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_run_type_counts_accumulate(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "pro").await;

    for _ in 0..2 {
        UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard)
            .await
            .unwrap();
    }
    UsageRepo::check_and_increment(&pool, tenant_id, "recipe", EnforcementMode::Hard)
        .await
        .unwrap();

    let period = UsageRepo::current_period(&pool, tenant_id).await.unwrap().unwrap();
    assert_eq!(period.run_count, 3);
    assert_eq!(period.run_type_counts, json!({"agent": 2, "recipe": 1}));
}

// ---------------------------------------------------------------------------
// Test: Hard mode rejects at the limit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_hard_mode_rejects_at_limit(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "free").await;
    seed_period_with_limit(&pool, tenant_id, 1).await;

    let first = UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard)
        .await
        .unwrap();
    assert!(first.allowed);
    assert_eq!(first.current, 1);

    let second = UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard)
        .await
        .unwrap();
    assert!(!second.allowed);
    assert!(!second.overage);
    // Rejection writes nothing.
    assert_eq!(second.current, 1);
    assert_eq!(second.limit, Some(1));

    let period = UsageRepo::current_period(&pool, tenant_id).await.unwrap().unwrap();
    assert_eq!(period.run_count, 1);
    assert_eq!(period.overage_count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_hard_checks_admit_exactly_one(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "free").await;
    seed_period_with_limit(&pool, tenant_id, 1).await;

    // Both checks race for the period row lock; the loser re-reads a
    // count already at the limit.
    let (a, b) = tokio::join!(
        UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard),
        UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.allowed, b.allowed, "Exactly one of two racing checks may pass");

    let period = UsageRepo::current_period(&pool, tenant_id).await.unwrap().unwrap();
    assert_eq!(period.run_count, 1);
    assert_eq!(period.overage_count, 0);
}

// ---------------------------------------------------------------------------
// Test: Soft mode meters paid plans as overage, still blocks free
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_soft_mode_overage_on_paid_plan(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "starter").await;
    seed_period_with_limit(&pool, tenant_id, 1).await;

    UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Soft)
        .await
        .unwrap();

    let over = UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Soft)
        .await
        .unwrap();
    assert!(over.allowed);
    assert!(over.overage);
    assert_eq!(over.current, 2);

    let period = UsageRepo::current_period(&pool, tenant_id).await.unwrap().unwrap();
    assert_eq!(period.run_count, 2);
    assert_eq!(period.overage_count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_soft_checks_meter_one_overage(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "starter").await;
    seed_period_with_limit(&pool, tenant_id, 1).await;

    let (a, b) = tokio::join!(
        UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Soft),
        UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Soft),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.allowed && b.allowed, "Paid plans keep running under soft enforcement");
    assert_ne!(a.overage, b.overage, "Only the over-limit run is metered as overage");

    let period = UsageRepo::current_period(&pool, tenant_id).await.unwrap().unwrap();
    assert_eq!(period.run_count, 2);
    assert_eq!(period.overage_count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_soft_mode_still_blocks_free_plan(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "free").await;
    seed_period_with_limit(&pool, tenant_id, 1).await;

    UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Soft)
        .await
        .unwrap();

    let second = UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Soft)
        .await
        .unwrap();
    assert!(!second.allowed, "Free plan has no overage billing to fall back on");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_enterprise_is_unlimited(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "enterprise").await;

    for _ in 0..5 {
        let check =
            UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard)
                .await
                .unwrap();
        assert!(check.allowed);
        assert!(!check.overage);
        assert_eq!(check.limit, None);
    }
}

// ---------------------------------------------------------------------------
// Test: The frozen limit ignores mid-period plan changes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_limit_frozen_at_period_creation(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "free").await;
    seed_period_with_limit(&pool, tenant_id, 1).await;

    UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard)
        .await
        .unwrap();

    // Upgrading the plan does not rewrite the existing period's limit.
    TenantRepo::set_plan(&pool, tenant_id, "pro").await.unwrap();

    let period = UsageRepo::current_period(&pool, tenant_id).await.unwrap().unwrap();
    assert_eq!(period.run_limit, Some(1));
}

// ---------------------------------------------------------------------------
// Test: Decrement compensation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_decrement_compensates_failed_dispatch(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "pro").await;

    UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard)
        .await
        .unwrap();
    UsageRepo::decrement(&pool, tenant_id, "agent").await.unwrap();

    let period = UsageRepo::current_period(&pool, tenant_id).await.unwrap().unwrap();
    assert_eq!(period.run_count, 0);
    assert_eq!(period.run_type_counts, json!({"agent": 0}));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_decrement_clamps_at_zero(pool: PgPool) {
    let tenant_id = seed_tenant(&pool, "acme", "pro").await;

    UsageRepo::check_and_increment(&pool, tenant_id, "agent", EnforcementMode::Hard)
        .await
        .unwrap();
    UsageRepo::decrement(&pool, tenant_id, "agent").await.unwrap();
    // A second decrement must not go negative.
    UsageRepo::decrement(&pool, tenant_id, "agent").await.unwrap();

    let period = UsageRepo::current_period(&pool, tenant_id).await.unwrap().unwrap();
    assert_eq!(period.run_count, 0);
}
