#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::billing::resolver::fetch_live_subscription;
use crate::errors::AppError;

/// Closed enumeration of cancellation reasons. Free-text detail rides along
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    TooExpensive,
    NotUsing,
    FoundAlternative,
    MissingFeatures,
    TechnicalIssues,
    TemporaryPause,
    Other,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::TooExpensive => "too_expensive",
            CancelReason::NotUsing => "not_using",
            CancelReason::FoundAlternative => "found_alternative",
            CancelReason::MissingFeatures => "missing_features",
            CancelReason::TechnicalIssues => "technical_issues",
            CancelReason::TemporaryPause => "temporary_pause",
            CancelReason::Other => "other",
        }
    }
}

/// Steps of the user-driven cancellation wizard. Strictly linear:
/// confirm → reason → final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationStep {
    Confirm,
    Reason,
    Final,
}

/// Client-orchestrated cancellation flow. The first step is a pure gate
/// (acknowledging feature loss, no backend call); only the reason step
/// invokes the remote cancel operation; the final step displays the
/// backend's expiry date verbatim.
#[derive(Debug, Clone)]
pub struct CancellationFlow {
    step: CancellationStep,
    reason: Option<CancelReason>,
    comment: Option<String>,
    /// Last expiry date known before the cancel call, used as fallback when
    /// the backend returns no new date.
    known_expires_at: Option<DateTime<Utc>>,
    final_expires_at: Option<DateTime<Utc>>,
}

impl CancellationFlow {
    pub fn new(known_expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            step: CancellationStep::Confirm,
            reason: None,
            comment: None,
            known_expires_at,
            final_expires_at: None,
        }
    }

    pub fn step(&self) -> CancellationStep {
        self.step
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.reason
    }

    /// confirm → reason. Requires explicit acknowledgment of feature loss.
    pub fn acknowledge(&mut self) -> Result<(), AppError> {
        if self.step != CancellationStep::Confirm {
            return Err(AppError::Validation(
                "Cancellation already acknowledged".to_string(),
            ));
        }
        self.step = CancellationStep::Reason;
        Ok(())
    }

    /// Records the selected reason while on the reason step.
    pub fn select_reason(
        &mut self,
        reason: CancelReason,
        comment: Option<String>,
    ) -> Result<(), AppError> {
        if self.step != CancellationStep::Reason {
            return Err(AppError::Validation(
                "A reason can only be selected on the reason step".to_string(),
            ));
        }
        self.reason = Some(reason);
        self.comment = comment.filter(|c| !c.trim().is_empty());
        Ok(())
    }

    /// Whether the remote cancel operation may be invoked. The reason is
    /// mandatory; the comment is not.
    pub fn ready_to_submit(&self) -> bool {
        self.step == CancellationStep::Reason && self.reason.is_some()
    }

    /// reason → final, after the remote operation succeeded. The backend's
    /// date is authoritative; with no new date the previously known expiry
    /// is displayed unmodified.
    pub fn complete(&mut self, backend_expires_at: Option<DateTime<Utc>>) -> Result<(), AppError> {
        if !self.ready_to_submit() {
            return Err(AppError::Validation(
                "Cancellation requires an acknowledged flow with a reason".to_string(),
            ));
        }
        self.final_expires_at = backend_expires_at.or(self.known_expires_at);
        self.step = CancellationStep::Final;
        Ok(())
    }

    /// After a failed call the flow stays on the reason step with the
    /// already-entered reason retained, so retrying is a plain re-submit.
    pub fn note_failure(&self) -> CancellationStep {
        self.step
    }

    pub fn final_expires_at(&self) -> Option<DateTime<Utc>> {
        self.final_expires_at
    }
}

/// Outcome of the remote cancel operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOutcome {
    /// Access-expiry date. Cancellation defers loss of access to the
    /// paid-through date, never "now".
    pub expires_at: Option<DateTime<Utc>>,
    pub already_pending: bool,
}

/// Records a cancellation request. Idempotent: repeating the call leaves
/// the same terminal expiry and never double-cancels; each call appends
/// exactly one audit event. The row stays intact with only the
/// pending-cancellation marker set, so reactivation before expiry remains
/// possible.
pub async fn cancel_subscription(
    pool: &PgPool,
    user_id: Uuid,
    reason: CancelReason,
    comment: Option<&str>,
) -> Result<CancellationOutcome, AppError> {
    let subscription = fetch_live_subscription(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription to cancel".to_string()))?;

    let already_pending = subscription.cancel_at_period_end;
    if !already_pending {
        sqlx::query(
            "UPDATE user_subscriptions SET cancel_at_period_end = true, updated_at = now() WHERE id = $1",
        )
        .bind(subscription.id)
        .execute(pool)
        .await?;
    }

    let detail = match comment {
        Some(c) if !c.trim().is_empty() => format!("{}: {}", reason.as_str(), c.trim()),
        _ => reason.as_str().to_string(),
    };
    record_event(pool, user_id, subscription.id, "cancellation_requested", Some(&detail)).await?;

    info!(
        "Cancellation recorded for user {user_id} (reason: {}, pending_before: {already_pending})",
        reason.as_str()
    );

    Ok(CancellationOutcome {
        expires_at: subscription.expires_at,
        already_pending,
    })
}

/// Clears a pending cancellation before the paid-through date has passed.
pub async fn reactivate_subscription(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let subscription = fetch_live_subscription(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))?;

    if !subscription.cancel_at_period_end {
        return Err(AppError::Conflict(
            "Subscription has no pending cancellation".to_string(),
        ));
    }
    if let Some(expires_at) = subscription.expires_at {
        if expires_at <= Utc::now() {
            return Err(AppError::Conflict(
                "Subscription already expired; a new subscription is required".to_string(),
            ));
        }
    }

    sqlx::query(
        "UPDATE user_subscriptions SET cancel_at_period_end = false, updated_at = now() WHERE id = $1",
    )
    .bind(subscription.id)
    .execute(pool)
    .await?;
    record_event(pool, user_id, subscription.id, "reactivated", None).await?;

    info!("Subscription reactivated for user {user_id}");
    Ok(())
}

/// Appends one audit row to the subscription event trail.
pub async fn record_event(
    pool: &PgPool,
    user_id: Uuid,
    subscription_id: Uuid,
    event_type: &str,
    detail: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO subscription_events (id, user_id, subscription_id, event_type, detail)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(subscription_id)
    .bind(event_type)
    .bind(detail)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_flow_starts_at_confirm() {
        let flow = CancellationFlow::new(None);
        assert_eq!(flow.step(), CancellationStep::Confirm);
        assert!(!flow.ready_to_submit());
    }

    #[test]
    fn test_acknowledge_advances_to_reason() {
        let mut flow = CancellationFlow::new(None);
        flow.acknowledge().unwrap();
        assert_eq!(flow.step(), CancellationStep::Reason);
    }

    #[test]
    fn test_cannot_acknowledge_twice() {
        let mut flow = CancellationFlow::new(None);
        flow.acknowledge().unwrap();
        assert!(flow.acknowledge().is_err());
    }

    #[test]
    fn test_reason_required_before_submit() {
        let mut flow = CancellationFlow::new(None);
        flow.acknowledge().unwrap();
        assert!(!flow.ready_to_submit());
        flow.select_reason(CancelReason::TooExpensive, None).unwrap();
        assert!(flow.ready_to_submit());
    }

    #[test]
    fn test_cannot_select_reason_on_confirm_step() {
        let mut flow = CancellationFlow::new(None);
        assert!(flow.select_reason(CancelReason::Other, None).is_err());
    }

    #[test]
    fn test_cannot_complete_without_reason() {
        let mut flow = CancellationFlow::new(None);
        flow.acknowledge().unwrap();
        assert!(flow.complete(Some(Utc::now())).is_err());
        assert_eq!(flow.step(), CancellationStep::Reason);
    }

    #[test]
    fn test_backend_date_is_authoritative() {
        let known = Utc::now() + Duration::days(10);
        let backend = Utc::now() + Duration::days(30);
        let mut flow = CancellationFlow::new(Some(known));
        flow.acknowledge().unwrap();
        flow.select_reason(CancelReason::NotUsing, None).unwrap();
        flow.complete(Some(backend)).unwrap();
        assert_eq!(flow.step(), CancellationStep::Final);
        assert_eq!(flow.final_expires_at(), Some(backend));
    }

    #[test]
    fn test_falls_back_to_known_expiry() {
        // Backend returned no new date; the previously known expires_at is
        // displayed unmodified.
        let known = Utc::now() + Duration::days(10);
        let mut flow = CancellationFlow::new(Some(known));
        flow.acknowledge().unwrap();
        flow.select_reason(CancelReason::TooExpensive, None).unwrap();
        flow.complete(None).unwrap();
        assert_eq!(flow.final_expires_at(), Some(known));
    }

    #[test]
    fn test_retry_keeps_reason() {
        let mut flow = CancellationFlow::new(None);
        flow.acknowledge().unwrap();
        flow.select_reason(CancelReason::TechnicalIssues, Some("app crashes".to_string()))
            .unwrap();
        // Remote call failed; flow must stay on reason with the selection
        // intact so resubmission needs no re-collection.
        assert_eq!(flow.note_failure(), CancellationStep::Reason);
        assert_eq!(flow.reason(), Some(CancelReason::TechnicalIssues));
        assert!(flow.ready_to_submit());
    }

    #[test]
    fn test_blank_comment_is_dropped() {
        let mut flow = CancellationFlow::new(None);
        flow.acknowledge().unwrap();
        flow.select_reason(CancelReason::Other, Some("   ".to_string()))
            .unwrap();
        assert!(flow.comment.is_none());
    }
}
