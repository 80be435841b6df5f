use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthedUser;
use crate::billing::cancellation::{
    cancel_subscription, reactivate_subscription, record_event, CancelReason,
};
use crate::billing::quota::{record_usage, reset_current_usage};
use crate::billing::resolver::{fetch_live_subscription, resolve_plan_access, PlanAccess};
use crate::errors::{map_unique_violation, AppError};
use crate::realtime::{ChangeEvent, ChangeKind, ResourceKind};
use crate::state::AppState;

/// GET /api/v1/billing/access
pub async fn handle_get_access(
    State(state): State<AppState>,
    user: AuthedUser,
) -> Result<Json<PlanAccess>, AppError> {
    let access = resolve_plan_access(&state.db, user.id).await?;
    Ok(Json(access))
}

#[derive(Serialize)]
pub struct UsageResponse {
    pub used_this_month: i32,
    pub remaining: i32,
    pub monthly_limit: i32,
}

/// POST /api/v1/billing/usage
/// Consumes one metered unit. The resolver read is advisory; the increment
/// itself is the atomic gate, so concurrent requests cannot overshoot.
pub async fn handle_record_usage(
    State(state): State<AppState>,
    user: AuthedUser,
) -> Result<Json<UsageResponse>, AppError> {
    let access = resolve_plan_access(&state.db, user.id).await?;
    if access.remaining == 0 {
        return Err(AppError::QuotaExceeded);
    }

    let used = record_usage(&state.db, user.id, access.monthly_limit, Utc::now()).await?;
    Ok(Json(UsageResponse {
        used_this_month: used,
        remaining: (access.monthly_limit - used).max(0),
        monthly_limit: access.monthly_limit,
    }))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: CancelReason,
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct CancelResponse {
    /// Authoritative access-expiry date; access continues until then.
    pub expires_at: Option<chrono::DateTime<Utc>>,
    pub already_pending: bool,
}

/// POST /api/v1/billing/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    user: AuthedUser,
    Json(req): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, AppError> {
    let outcome =
        cancel_subscription(&state.db, user.id, req.reason, req.comment.as_deref()).await?;
    state.realtime.publish(ChangeEvent {
        resource: ResourceKind::Subscription,
        scope_id: user.id,
        entity_id: user.id,
        change: ChangeKind::Updated,
    });
    Ok(Json(CancelResponse {
        expires_at: outcome.expires_at,
        already_pending: outcome.already_pending,
    }))
}

/// POST /api/v1/billing/reactivate
pub async fn handle_reactivate(
    State(state): State<AppState>,
    user: AuthedUser,
) -> Result<Json<PlanAccess>, AppError> {
    reactivate_subscription(&state.db, user.id).await?;
    state.realtime.publish(ChangeEvent {
        resource: ResourceKind::Subscription,
        scope_id: user.id,
        entity_id: user.id,
        change: ChangeKind::Updated,
    });
    let access = resolve_plan_access(&state.db, user.id).await?;
    Ok(Json(access))
}

#[derive(Deserialize)]
pub struct ChangePlanRequest {
    pub plan_id: String,
}

/// POST /api/v1/admin/users/:id/plan
/// Moves a user onto another plan: updates the live subscription row or,
/// when none exists, creates an active one.
pub async fn handle_admin_change_plan(
    State(state): State<AppState>,
    admin: AuthedUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ChangePlanRequest>,
) -> Result<Json<PlanAccess>, AppError> {
    admin.require_admin()?;

    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM plans WHERE id = $1")
        .bind(&req.plan_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(AppError::Validation(format!(
            "Unknown plan '{}'",
            req.plan_id
        )));
    }

    let subscription_id = match fetch_live_subscription(&state.db, user_id).await? {
        Some(subscription) => {
            sqlx::query(
                "UPDATE user_subscriptions SET plan_id = $1, updated_at = now() WHERE id = $2",
            )
            .bind(&req.plan_id)
            .bind(subscription.id)
            .execute(&state.db)
            .await?;
            subscription.id
        }
        None => {
            let id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO user_subscriptions (id, user_id, plan_id, status, billing_cycle)
                VALUES ($1, $2, $3, 'active', 'monthly')
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(&req.plan_id)
            .execute(&state.db)
            .await
            // The partial unique index on live rows is the authority here;
            // a concurrent insert surfaces as a conflict.
            .map_err(|e| map_unique_violation(e, "User already has a live subscription"))?;
            id
        }
    };

    record_event(
        &state.db,
        user_id,
        subscription_id,
        "plan_changed",
        Some(&req.plan_id),
    )
    .await?;
    info!("Admin {} moved user {user_id} to plan {}", admin.id, req.plan_id);

    let access = resolve_plan_access(&state.db, user_id).await?;
    Ok(Json(access))
}

/// POST /api/v1/admin/users/:id/usage/reset
pub async fn handle_admin_reset_usage(
    State(state): State<AppState>,
    admin: AuthedUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PlanAccess>, AppError> {
    admin.require_admin()?;
    reset_current_usage(&state.db, user_id).await?;
    info!("Admin {} reset current usage for user {user_id}", admin.id);
    let access = resolve_plan_access(&state.db, user_id).await?;
    Ok(Json(access))
}
