#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Reviewed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Reviewed => "reviewed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(SubmissionStatus::Draft),
            "submitted" => Some(SubmissionStatus::Submitted),
            "reviewed" => Some(SubmissionStatus::Reviewed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewResult {
    Approved,
    Revision,
    Rejected,
}

impl ReviewResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewResult::Approved => "approved",
            ReviewResult::Revision => "revision",
            ReviewResult::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ReviewResult::Approved),
            "revision" => Some(ReviewResult::Revision),
            "rejected" => Some(ReviewResult::Rejected),
            _ => None,
        }
    }
}

/// One learner's deliverable for one assignment.
/// UNIQUE (user_id, assignment_id) — the constraint, not the client, is
/// what prevents duplicate submissions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assignment_id: Uuid,
    pub status: String,
    pub text_content: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub review_result: Option<String>,
    pub feedback: Option<String>,
    /// Monotonic draft version; autosave must present the version it last
    /// saw or the write is refused as stale.
    pub version: i32,
    /// Resubmission cycle, starting at 1.
    pub attempt: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRow {
    pub fn status_enum(&self) -> Option<SubmissionStatus> {
        SubmissionStatus::parse(&self.status)
    }

    pub fn review_result_enum(&self) -> Option<ReviewResult> {
        self.review_result.as_deref().and_then(ReviewResult::parse)
    }

    pub fn has_file(&self) -> bool {
        self.file_url.is_some()
    }

    pub fn has_text(&self) -> bool {
        self.text_content
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}
