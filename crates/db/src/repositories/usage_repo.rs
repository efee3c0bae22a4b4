//! Repository for the `usage_periods` table.
//!
//! The (tenant, period) row is the critical section for run metering:
//! `check_and_increment` takes a `FOR UPDATE` lock on it so concurrent
//! run starts serialize and the limit cannot be raced past. The row is
//! created lazily on first use each period.

use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use stagehand_core::error::CoreError;
use stagehand_core::plans::{limits_for, quota_action, EnforcementMode, PlanTier, QuotaAction};
use stagehand_core::types::DbId;

use crate::models::usage::{QuotaCheck, UsagePeriod};
use crate::DbResult;

/// Column list for usage_periods queries.
const COLUMNS: &str = "id, tenant_id, period_start, run_count, run_limit, \
    overage_count, run_type_counts, created_at, updated_at";

/// Provides run metering against per-tenant usage periods.
pub struct UsageRepo;

impl UsageRepo {
    /// Atomically decide whether one more run is allowed and count it.
    ///
    /// Under the limit the run is counted and allowed. At or over the
    /// limit, `hard` mode rejects; `soft` mode rejects only plans
    /// without overage billing and otherwise counts the run as overage.
    /// A rejection writes nothing.
    pub async fn check_and_increment(
        pool: &PgPool,
        tenant_id: DbId,
        run_type: &str,
        mode: EnforcementMode,
    ) -> DbResult<QuotaCheck> {
        let mut tx = pool.begin().await?;

        let (tier, anchor_day) = Self::tenant_plan(&mut *tx, tenant_id).await?;
        let period_start = period_start_for(Utc::now().date_naive(), anchor_day);
        let run_limit = limits_for(tier).monthly_runs;

        // Lazily create the period row; the limit is frozen into it at
        // creation so a mid-period plan change only affects new periods.
        sqlx::query(
            "INSERT INTO usage_periods (tenant_id, period_start, run_limit)
             VALUES ($1, $2, $3)
             ON CONFLICT (tenant_id, period_start) DO NOTHING",
        )
        .bind(tenant_id)
        .bind(period_start)
        .bind(run_limit)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "SELECT {COLUMNS} FROM usage_periods
             WHERE tenant_id = $1 AND period_start = $2
             FOR UPDATE"
        );
        let period = sqlx::query_as::<_, UsagePeriod>(&query)
            .bind(tenant_id)
            .bind(period_start)
            .fetch_one(&mut *tx)
            .await?;

        let action = quota_action(mode, tier, period.run_count, period.run_limit);
        let overage = match action {
            QuotaAction::Reject => {
                return Ok(QuotaCheck {
                    allowed: false,
                    current: period.run_count,
                    limit: period.run_limit,
                    overage: false,
                });
            }
            QuotaAction::Allow => false,
            QuotaAction::Overage => true,
        };

        let updated: (i64,) = sqlx::query_as(
            "UPDATE usage_periods SET
                run_count = run_count + 1,
                overage_count = overage_count + CASE WHEN $3 THEN 1 ELSE 0 END,
                run_type_counts = jsonb_set(
                    run_type_counts,
                    ARRAY[$2],
                    to_jsonb(COALESCE((run_type_counts ->> $2)::bigint, 0) + 1)
                ),
                updated_at = NOW()
             WHERE id = $1
             RETURNING run_count",
        )
        .bind(period.id)
        .bind(run_type)
        .bind(overage)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(QuotaCheck {
            allowed: true,
            current: updated.0,
            limit: period.run_limit,
            overage,
        })
    }

    /// Compensate for a run that was counted but never executed.
    /// Clamped at zero; no lock, a lost decrement only over-counts.
    pub async fn decrement(pool: &PgPool, tenant_id: DbId, run_type: &str) -> DbResult<()> {
        let mut conn = pool.acquire().await?;
        let (_, anchor_day) = Self::tenant_plan(&mut conn, tenant_id).await?;
        let period_start = period_start_for(Utc::now().date_naive(), anchor_day);

        sqlx::query(
            "UPDATE usage_periods SET
                run_count = GREATEST(run_count - 1, 0),
                run_type_counts = jsonb_set(
                    run_type_counts,
                    ARRAY[$3],
                    to_jsonb(GREATEST(COALESCE((run_type_counts ->> $3)::bigint, 0) - 1, 0))
                ),
                updated_at = NOW()
             WHERE tenant_id = $1 AND period_start = $2",
        )
        .bind(tenant_id)
        .bind(period_start)
        .bind(run_type)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// The tenant's current usage period, if any runs have been counted
    /// this period.
    pub async fn current_period(
        pool: &PgPool,
        tenant_id: DbId,
    ) -> DbResult<Option<UsagePeriod>> {
        let mut conn = pool.acquire().await?;
        let (_, anchor_day) = Self::tenant_plan(&mut conn, tenant_id).await?;
        let period_start = period_start_for(Utc::now().date_naive(), anchor_day);

        let query = format!(
            "SELECT {COLUMNS} FROM usage_periods
             WHERE tenant_id = $1 AND period_start = $2"
        );
        let period = sqlx::query_as::<_, UsagePeriod>(&query)
            .bind(tenant_id)
            .bind(period_start)
            .fetch_optional(pool)
            .await?;
        Ok(period)
    }

    async fn tenant_plan(
        conn: &mut PgConnection,
        tenant_id: DbId,
    ) -> DbResult<(PlanTier, Option<i16>)> {
        let row: Option<(String, Option<i16>)> =
            sqlx::query_as("SELECT plan, billing_anchor_day FROM tenants WHERE id = $1")
                .bind(tenant_id)
                .fetch_optional(conn)
                .await?;
        let Some((plan, anchor_day)) = row else {
            return Err(CoreError::NotFound {
                entity: "Tenant",
                id: tenant_id,
            }
            .into());
        };
        let tier: PlanTier = plan.parse()?;
        Ok((tier, anchor_day))
    }
}

/// Resolve the period start date for `today`.
///
/// With an anchor day the period runs anchor-to-anchor: the start is
/// the anchor day of the current month when `today` has reached it,
/// else of the previous month. The anchor is clamped to the month's
/// length. Without an anchor the period is the calendar month.
pub fn period_start_for(today: NaiveDate, anchor_day: Option<i16>) -> NaiveDate {
    let Some(anchor) = anchor_day else {
        return NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
            .unwrap_or(today);
    };
    let anchor = anchor.clamp(1, 31) as u32;

    let in_month = |year: i32, month: u32| -> NaiveDate {
        let mut day = anchor;
        loop {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return date;
            }
            day -= 1;
        }
    };

    let this_month = in_month(today.year(), today.month());
    if today >= this_month {
        this_month
    } else if today.month() == 1 {
        in_month(today.year() - 1, 12)
    } else {
        in_month(today.year(), today.month() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn no_anchor_uses_calendar_month() {
        assert_eq!(period_start_for(date(2026, 8, 30), None), date(2026, 8, 1));
        assert_eq!(period_start_for(date(2026, 8, 1), None), date(2026, 8, 1));
    }

    #[test]
    fn anchor_in_current_month_once_reached() {
        assert_eq!(
            period_start_for(date(2026, 8, 30), Some(15)),
            date(2026, 8, 15)
        );
        assert_eq!(
            period_start_for(date(2026, 8, 15), Some(15)),
            date(2026, 8, 15)
        );
    }

    #[test]
    fn anchor_falls_back_to_previous_month() {
        assert_eq!(
            period_start_for(date(2026, 8, 10), Some(15)),
            date(2026, 7, 15)
        );
    }

    #[test]
    fn anchor_wraps_across_year_boundary() {
        assert_eq!(
            period_start_for(date(2026, 1, 5), Some(20)),
            date(2025, 12, 20)
        );
    }

    #[test]
    fn anchor_clamps_to_short_months() {
        // Anchor 31 in a 30-day month starts on the 30th.
        assert_eq!(
            period_start_for(date(2026, 4, 30), Some(31)),
            date(2026, 4, 30)
        );
        // February: anchor 31 clamps to the 28th.
        assert_eq!(
            period_start_for(date(2026, 3, 10), Some(31)),
            date(2026, 2, 28)
        );
    }
}
