#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::cancellation::record_event;
use crate::errors::AppError;
use crate::models::plan::BASIC_PLAN_ID;
use crate::models::subscription::SubscriptionStatus;

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileReport {
    pub expired: usize,
    pub moved_to_grace: usize,
    pub suspended: usize,
}

/// Whether a pending cancellation is due for expiry.
pub fn cancellation_due(
    cancel_at_period_end: bool,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    cancel_at_period_end && expires_at.map(|e| e <= now).unwrap_or(false)
}

/// Next dunning state for a failed-payment subscription, if the grace
/// window has run out. `since` is when the row entered its current status.
pub fn dunning_transition(
    status: SubscriptionStatus,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    grace_days: i64,
) -> Option<SubscriptionStatus> {
    let window_over = now - since >= Duration::days(grace_days);
    match status {
        SubscriptionStatus::PastDue if window_over => Some(SubscriptionStatus::GracePeriod),
        SubscriptionStatus::GracePeriod if window_over => Some(SubscriptionStatus::Inactive),
        _ => None,
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DueRow {
    id: Uuid,
    user_id: Uuid,
}

/// Idempotent reconciliation pass. Scheduled externally (interval task in
/// main); safe to re-run at any time — a second pass over the same data is
/// a no-op and appends no duplicate audit events.
pub async fn run_reconciliation(
    pool: &PgPool,
    grace_days: i64,
) -> Result<ReconcileReport, AppError> {
    let now = Utc::now();
    let mut report = ReconcileReport::default();

    // Pending cancellations past their paid-through date: close the row and
    // collapse entitlements to basic. The WHERE clause keeps this
    // idempotent — closed rows no longer match.
    let expired: Vec<DueRow> = sqlx::query_as(
        r#"
        UPDATE user_subscriptions
        SET status = 'cancelled', plan_id = $1, updated_at = now()
        WHERE cancel_at_period_end = true
          AND expires_at <= $2
          AND status IN ('trial', 'active', 'past_due', 'grace_period')
        RETURNING id, user_id
        "#,
    )
    .bind(BASIC_PLAN_ID)
    .bind(now)
    .fetch_all(pool)
    .await?;

    for row in &expired {
        record_event(pool, row.user_id, row.id, "expired", None).await?;
    }
    report.expired = expired.len();

    // Failed payments: past_due rows older than the grace window move into
    // grace_period, grace_period rows older than the window are suspended.
    let grace_cutoff = now - Duration::days(grace_days);

    let suspended: Vec<DueRow> = sqlx::query_as(
        r#"
        UPDATE user_subscriptions
        SET status = 'inactive', updated_at = now()
        WHERE status = 'grace_period' AND updated_at < $1
        RETURNING id, user_id
        "#,
    )
    .bind(grace_cutoff)
    .fetch_all(pool)
    .await?;
    for row in &suspended {
        record_event(pool, row.user_id, row.id, "suspended", None).await?;
        warn!("Subscription {} suspended after grace period", row.id);
    }
    report.suspended = suspended.len();

    let graced: Vec<DueRow> = sqlx::query_as(
        r#"
        UPDATE user_subscriptions
        SET status = 'grace_period', updated_at = now()
        WHERE status = 'past_due' AND updated_at < $1
        RETURNING id, user_id
        "#,
    )
    .bind(grace_cutoff)
    .fetch_all(pool)
    .await?;
    for row in &graced {
        record_event(pool, row.user_id, row.id, "grace_period_started", None).await?;
    }
    report.moved_to_grace = graced.len();

    if report.expired + report.moved_to_grace + report.suspended > 0 {
        info!(
            "Reconciliation pass: {} expired, {} to grace, {} suspended",
            report.expired, report.moved_to_grace, report.suspended
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_cancellation_due_after_expiry() {
        assert!(cancellation_due(true, Some(at(1)), at(2)));
    }

    #[test]
    fn test_cancellation_not_due_before_expiry() {
        assert!(!cancellation_due(true, Some(at(10)), at(2)));
    }

    #[test]
    fn test_no_marker_never_due() {
        assert!(!cancellation_due(false, Some(at(1)), at(2)));
    }

    #[test]
    fn test_missing_expiry_never_due() {
        // Without a paid-through date there is nothing to expire against.
        assert!(!cancellation_due(true, None, at(2)));
    }

    #[test]
    fn test_past_due_enters_grace_after_window() {
        let next = dunning_transition(SubscriptionStatus::PastDue, at(1), at(9), 7);
        assert_eq!(next, Some(SubscriptionStatus::GracePeriod));
    }

    #[test]
    fn test_past_due_waits_out_window() {
        let next = dunning_transition(SubscriptionStatus::PastDue, at(1), at(3), 7);
        assert_eq!(next, None);
    }

    #[test]
    fn test_grace_period_suspends_after_window() {
        let next = dunning_transition(SubscriptionStatus::GracePeriod, at(1), at(9), 7);
        assert_eq!(next, Some(SubscriptionStatus::Inactive));
    }

    #[test]
    fn test_active_rows_untouched() {
        assert_eq!(dunning_transition(SubscriptionStatus::Active, at(1), at(30), 7), None);
        assert_eq!(dunning_transition(SubscriptionStatus::Inactive, at(1), at(30), 7), None);
    }
}
