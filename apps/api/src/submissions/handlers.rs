use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthedUser;
use crate::errors::AppError;
use crate::models::assignment::AssignmentRow;
use crate::models::submission::{ReviewResult, SubmissionRow, SubmissionStatus};
use crate::realtime::{ChangeEvent, ChangeKind, ResourceKind};
use crate::state::AppState;
use crate::storage::{object_key, StoredFile};
use crate::submissions::autosave::{save_draft, DraftContent, DraftSaveOutcome};
use crate::submissions::files::upload_submission_file;
use crate::submissions::lifecycle;

const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

async fn fetch_assignment(state: &AppState, id: Uuid) -> Result<AssignmentRow, AppError> {
    let assignment: Option<AssignmentRow> =
        sqlx::query_as("SELECT * FROM assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;
    assignment.ok_or_else(|| AppError::NotFound(format!("Assignment {id} not found")))
}

async fn fetch_submission(state: &AppState, id: Uuid) -> Result<SubmissionRow, AppError> {
    let submission: Option<SubmissionRow> =
        sqlx::query_as("SELECT * FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;
    submission.ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))
}

fn publish_change(state: &AppState, submission: &SubmissionRow, change: ChangeKind) {
    state.realtime.publish(ChangeEvent {
        resource: ResourceKind::Submission,
        scope_id: submission.assignment_id,
        entity_id: submission.id,
        change,
    });
}

#[derive(Deserialize)]
pub struct DraftSaveRequest {
    pub assignment_id: Uuid,
    pub text_content: Option<String>,
    pub file: Option<StoredFile>,
    /// Version the client last saw; 0 for a first save.
    #[serde(default)]
    pub last_seen_version: i32,
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DraftSaveResponse {
    Saved { submission: SubmissionRow },
    Superseded,
    Stale { current_version: i32 },
}

/// PUT /api/v1/submissions/draft
/// Autosave endpoint. `superseded` and `stale` are ordinary outcomes the
/// client shows as a small saving indicator, not errors.
pub async fn handle_save_draft(
    State(state): State<AppState>,
    user: AuthedUser,
    Json(req): Json<DraftSaveRequest>,
) -> Result<Json<DraftSaveResponse>, AppError> {
    let assignment = fetch_assignment(&state, req.assignment_id).await?;
    if !assignment.is_published() {
        return Err(AppError::NotFound(format!(
            "Assignment {} not found",
            req.assignment_id
        )));
    }

    let content = DraftContent {
        text_content: req.text_content,
        file: req.file,
    };
    let outcome = save_draft(
        &state.db,
        user.id,
        assignment.id,
        &content,
        req.last_seen_version,
    )
    .await?;

    Ok(Json(match outcome {
        DraftSaveOutcome::Saved(submission) => {
            let change = if submission.version == 1 {
                ChangeKind::Inserted
            } else {
                ChangeKind::Updated
            };
            publish_change(&state, &submission, change);
            DraftSaveResponse::Saved { submission }
        }
        DraftSaveOutcome::Superseded => DraftSaveResponse::Superseded,
        DraftSaveOutcome::Stale { current_version } => {
            DraftSaveResponse::Stale { current_version }
        }
    }))
}

/// POST /api/v1/assignments/:id/files
/// Multipart upload. Validation runs before the storage call; a rejected
/// file never leaves the process. The client holds the returned reference
/// and attaches it to its next draft save, so "submit" stays unavailable
/// while an upload is in flight.
pub async fn handle_upload_file(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(assignment_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<StoredFile>, AppError> {
    let assignment = fetch_assignment(&state, assignment_id).await?;
    if !assignment.is_published() {
        return Err(AppError::NotFound(format!(
            "Assignment {assignment_id} not found"
        )));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
        .ok_or_else(|| AppError::Validation("No file in request".to_string()))?;

    let file_name = field
        .file_name()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Validation("Uploaded field has no file name".to_string()))?;
    let body = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;

    let stored =
        upload_submission_file(state.store.as_ref(), user.id, &assignment, &file_name, body)
            .await?;
    info!(
        "Stored submission file '{}' ({} bytes) for user {}",
        stored.name, stored.size, user.id
    );
    Ok(Json(stored))
}

/// POST /api/v1/submissions/:id/submit
pub async fn handle_submit(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionRow>, AppError> {
    let submission = fetch_submission(&state, id).await?;
    if submission.user_id != user.id {
        return Err(AppError::Forbidden);
    }

    let assignment = fetch_assignment(&state, submission.assignment_id).await?;
    let submission_type = assignment.submission_type_enum().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "Assignment {} carries unknown submission type '{}'",
            assignment.id,
            assignment.submission_type
        ))
    })?;

    if !lifecycle::within_submission_window(
        assignment.due_at,
        assignment.allow_late_submission,
        chrono::Utc::now(),
    ) {
        return Err(AppError::Validation(
            "The due date has passed and this assignment does not accept late submissions"
                .to_string(),
        ));
    }
    if !lifecycle::is_valid_for_submit(submission_type, submission.has_file(), submission.has_text())
    {
        return Err(AppError::Validation(match submission_type {
            crate::models::assignment::SubmissionType::File => {
                "A file is required before submitting".to_string()
            }
            crate::models::assignment::SubmissionType::Text => {
                "Text content is required before submitting".to_string()
            }
            crate::models::assignment::SubmissionType::Both => {
                "Either a file or text content is required before submitting".to_string()
            }
        }));
    }

    // Guarded on status so a concurrent submit or review cannot be
    // overwritten; zero rows means the row already advanced.
    let updated: Option<SubmissionRow> = sqlx::query_as(
        r#"
        UPDATE submissions
        SET status = 'submitted', submitted_at = now(), version = version + 1, updated_at = now()
        WHERE id = $1 AND status = 'draft'
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    let updated = updated
        .ok_or_else(|| AppError::Conflict("Submission was already submitted".to_string()))?;
    publish_change(&state, &updated, ChangeKind::Updated);
    info!("Submission {id} submitted by user {}", user.id);
    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub result: ReviewResult,
    pub feedback: Option<String>,
}

/// POST /api/v1/submissions/:id/review
/// Mentor/admin only. Terminal for the submission cycle.
pub async fn handle_review(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<SubmissionRow>, AppError> {
    user.require_reviewer()?;

    let submission = fetch_submission(&state, id).await?;
    let status = submission.status_enum().unwrap_or(SubmissionStatus::Draft);
    if !lifecycle::can_review(status) {
        return Err(AppError::Conflict(format!(
            "Submission is {} and cannot be reviewed",
            submission.status
        )));
    }

    let updated: Option<SubmissionRow> = sqlx::query_as(
        r#"
        UPDATE submissions
        SET status = 'reviewed', review_result = $1, feedback = $2,
            reviewed_at = now(), version = version + 1, updated_at = now()
        WHERE id = $3 AND status = 'submitted'
        RETURNING *
        "#,
    )
    .bind(req.result.as_str())
    .bind(&req.feedback)
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    let updated = updated
        .ok_or_else(|| AppError::Conflict("Submission is no longer reviewable".to_string()))?;
    publish_change(&state, &updated, ChangeKind::Updated);
    info!(
        "Submission {id} reviewed as {} by {}",
        req.result.as_str(),
        user.id
    );
    Ok(Json(updated))
}

/// POST /api/v1/submissions/:id/reopen
/// Starts a new cycle on the same row after a revision/rejected review,
/// when the assignment allows late submission. The prior outcome survives
/// only in the change feed; the row's review fields are cleared.
pub async fn handle_reopen(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionRow>, AppError> {
    let submission = fetch_submission(&state, id).await?;
    if submission.user_id != user.id {
        return Err(AppError::Forbidden);
    }

    let assignment = fetch_assignment(&state, submission.assignment_id).await?;
    let status = submission.status_enum().unwrap_or(SubmissionStatus::Draft);
    if !lifecycle::can_reopen(
        assignment.allow_late_submission,
        status,
        submission.review_result_enum(),
    ) {
        return Err(AppError::Conflict(
            "Submission cannot be reopened for another attempt".to_string(),
        ));
    }

    let updated: Option<SubmissionRow> = sqlx::query_as(
        r#"
        UPDATE submissions
        SET status = 'draft', review_result = NULL, feedback = NULL,
            submitted_at = NULL, reviewed_at = NULL,
            attempt = attempt + 1, version = version + 1, updated_at = now()
        WHERE id = $1 AND status = 'reviewed'
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    let updated =
        updated.ok_or_else(|| AppError::Conflict("Submission state changed; refetch".to_string()))?;
    publish_change(&state, &updated, ChangeKind::Updated);
    info!(
        "Submission {id} reopened by user {} (attempt {})",
        user.id, updated.attempt
    );
    Ok(Json(updated))
}

#[derive(Serialize)]
pub struct SubmissionView {
    pub submission: SubmissionRow,
    /// Time-limited link for the stored file, when one exists.
    pub download_url: Option<String>,
}

/// GET /api/v1/assignments/:id/submission
/// The caller's own submission for an assignment.
pub async fn handle_get_my_submission(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<SubmissionView>, AppError> {
    let submission: Option<SubmissionRow> = sqlx::query_as(
        "SELECT * FROM submissions WHERE user_id = $1 AND assignment_id = $2",
    )
    .bind(user.id)
    .bind(assignment_id)
    .fetch_optional(&state.db)
    .await?;
    let submission = submission
        .ok_or_else(|| AppError::NotFound("No submission for this assignment".to_string()))?;

    let download_url = match &submission.file_url {
        Some(url) => Some(
            state
                .store
                .presign_get(object_key(url), DOWNLOAD_URL_TTL)
                .await?,
        ),
        None => None,
    };

    Ok(Json(SubmissionView {
        submission,
        download_url,
    }))
}
