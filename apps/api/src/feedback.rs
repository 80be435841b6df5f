//! Bug/enhancement reports. Plain CRUD over one table.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::AuthedUser;
use crate::errors::AppError;
use crate::realtime::{ChangeEvent, ChangeKind, ResourceKind};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Bug,
    Enhancement,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Bug => "bug",
            FeedbackKind::Enhancement => "enhancement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Open => "open",
            FeedbackStatus::InProgress => "in_progress",
            FeedbackStatus::Resolved => "resolved",
            FeedbackStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPriority {
    Low,
    Medium,
    High,
}

impl FeedbackPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackPriority::Low => "low",
            FeedbackPriority::Medium => "medium",
            FeedbackPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedbackItemRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateFeedbackRequest {
    pub kind: FeedbackKind,
    pub title: String,
    pub description: String,
    pub priority: Option<FeedbackPriority>,
}

/// POST /api/v1/feedback
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthedUser,
    Json(req): Json<CreateFeedbackRequest>,
) -> Result<Json<FeedbackItemRow>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let priority = req.priority.unwrap_or(FeedbackPriority::Medium);
    let row: FeedbackItemRow = sqlx::query_as(
        r#"
        INSERT INTO feedback_items (id, user_id, kind, title, description, status, priority)
        VALUES ($1, $2, $3, $4, $5, 'open', $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(req.kind.as_str())
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(priority.as_str())
    .fetch_one(&state.db)
    .await?;

    state.realtime.publish(ChangeEvent {
        resource: ResourceKind::FeedbackItem,
        scope_id: row.user_id,
        entity_id: row.id,
        change: ChangeKind::Inserted,
    });
    Ok(Json(row))
}

/// GET /api/v1/feedback
/// Admins see everything; other users only their own reports.
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthedUser,
) -> Result<Json<Vec<FeedbackItemRow>>, AppError> {
    let rows: Vec<FeedbackItemRow> = if user.require_admin().is_ok() {
        sqlx::query_as("SELECT * FROM feedback_items ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as(
            "SELECT * FROM feedback_items WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user.id)
        .fetch_all(&state.db)
        .await?
    };
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct UpdateFeedbackRequest {
    pub status: Option<FeedbackStatus>,
    pub priority: Option<FeedbackPriority>,
}

/// PATCH /api/v1/feedback/:id
/// Triage is admin-only.
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateFeedbackRequest>,
) -> Result<Json<FeedbackItemRow>, AppError> {
    user.require_admin()?;

    let row: Option<FeedbackItemRow> = sqlx::query_as(
        r#"
        UPDATE feedback_items
        SET status = COALESCE($1, status),
            priority = COALESCE($2, priority),
            updated_at = now()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(req.status.map(|s| s.as_str()))
    .bind(req.priority.map(|p| p.as_str()))
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    let row = row.ok_or_else(|| AppError::NotFound(format!("Feedback item {id} not found")))?;
    state.realtime.publish(ChangeEvent {
        resource: ResourceKind::FeedbackItem,
        scope_id: row.user_id,
        entity_id: row.id,
        change: ChangeKind::Updated,
    });
    Ok(Json(row))
}
