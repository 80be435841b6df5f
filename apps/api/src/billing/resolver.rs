use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::billing::quota;
use crate::errors::AppError;
use crate::models::plan::{PlanRow, BASIC_PLAN_ID};
use crate::models::subscription::{SubscriptionRow, SubscriptionStatus};

/// The single authoritative view of a user's entitlements: subscription row,
/// referenced plan's feature map, and the current period's usage counter
/// merged into one structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAccess {
    pub plan_id: String,
    pub plan_name: String,
    pub features: Value,
    pub monthly_limit: i32,
    pub used_this_month: i32,
    pub remaining: i32,
    pub subscription_status: SubscriptionStatus,
    pub next_billing_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub will_cancel_at_period_end: bool,
    pub is_dunning: bool,
}

/// Fetches the user's live subscription, if any.
/// Two or more live rows is data corruption and must surface as a critical
/// error, never be resolved by picking one.
pub async fn fetch_live_subscription(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<SubscriptionRow>, AppError> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        r#"
        SELECT * FROM user_subscriptions
        WHERE user_id = $1 AND status IN ('trial', 'active', 'past_due', 'grace_period')
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.into_iter().next()),
        _ => Err(AppError::InconsistentSubscription(user_id)),
    }
}

async fn fetch_plan(pool: &PgPool, plan_id: &str) -> Result<PlanRow, AppError> {
    let plan: Option<PlanRow> = sqlx::query_as("SELECT * FROM plans WHERE id = $1")
        .bind(plan_id)
        .fetch_optional(pool)
        .await?;
    plan.ok_or_else(|| AppError::NotFound(format!("Plan '{plan_id}' not found")))
}

/// Resolves the authoritative entitlement view for a user. Read-only; a
/// pure projection over the subscription, plan, and usage tables.
pub async fn resolve_plan_access(pool: &PgPool, user_id: Uuid) -> Result<PlanAccess, AppError> {
    let subscription = fetch_live_subscription(pool, user_id).await?;

    let plan_id = subscription
        .as_ref()
        .map(|s| s.plan_id.as_str())
        .unwrap_or(BASIC_PLAN_ID);
    let plan = fetch_plan(pool, plan_id).await?;

    let used = quota::current_usage(pool, user_id, Utc::now()).await?;

    Ok(merge_access(subscription.as_ref(), &plan, used, Utc::now()))
}

/// Pure merge of the three sources into the client-facing view.
pub fn merge_access(
    subscription: Option<&SubscriptionRow>,
    plan: &PlanRow,
    used_this_month: i32,
    now: DateTime<Utc>,
) -> PlanAccess {
    let status = subscription
        .and_then(|s| s.status_enum())
        .unwrap_or(SubscriptionStatus::Inactive);

    // Access continues until expiry once cancellation is recorded; the row
    // only stops being "active"-like when reconciliation expires it.
    let will_cancel = subscription
        .map(|s| s.cancel_at_period_end && s.expires_at.map(|e| e > now).unwrap_or(true))
        .unwrap_or(false);

    let is_dunning = subscription
        .map(|s| status == SubscriptionStatus::PastDue && s.update_card_url.is_some())
        .unwrap_or(false);

    PlanAccess {
        plan_id: plan.id.clone(),
        plan_name: plan.name.clone(),
        features: plan.features.clone(),
        monthly_limit: plan.monthly_limit,
        used_this_month,
        remaining: plan.remaining(used_this_month),
        subscription_status: status,
        next_billing_at: subscription.and_then(|s| s.next_billing_at),
        expires_at: subscription.and_then(|s| s.expires_at),
        will_cancel_at_period_end: will_cancel,
        is_dunning,
    }
}
