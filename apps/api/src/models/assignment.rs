#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What a learner is expected to hand in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionType {
    File,
    Text,
    Both,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionType::File => "file",
            SubmissionType::Text => "text",
            SubmissionType::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(SubmissionType::File),
            "text" => Some(SubmissionType::Text),
            "both" => Some(SubmissionType::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignmentRow {
    pub id: Uuid,
    /// Learning space (espaço) this assignment belongs to.
    pub espaco_id: Uuid,
    pub title: String,
    pub description: String,
    pub due_at: Option<DateTime<Utc>>,
    pub submission_type: String,
    /// Upper bound for uploaded files, in bytes.
    pub max_file_size: i64,
    /// Lowercase extensions without the dot, e.g. ["pdf", "docx"].
    pub allowed_file_types: Vec<String>,
    /// "draft" assignments are invisible to students; only "published" ones
    /// accept submissions.
    pub status: String,
    pub allow_late_submission: bool,
    pub created_at: DateTime<Utc>,
}

impl AssignmentRow {
    pub fn submission_type_enum(&self) -> Option<SubmissionType> {
        SubmissionType::parse(&self.submission_type)
    }

    pub fn is_published(&self) -> bool {
        self.status == "published"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(status: &str) -> AssignmentRow {
        AssignmentRow {
            id: Uuid::new_v4(),
            espaco_id: Uuid::new_v4(),
            title: "Essay".to_string(),
            description: String::new(),
            due_at: None,
            submission_type: "file".to_string(),
            max_file_size: 1024,
            allowed_file_types: vec!["pdf".to_string()],
            status: status.to_string(),
            allow_late_submission: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_published_assignments_accept_student_interaction() {
        // Draft saves and file uploads both gate on this; an unpublished
        // assignment must look like it does not exist.
        assert!(assignment("published").is_published());
        assert!(!assignment("draft").is_published());
    }

    #[test]
    fn test_unknown_submission_type_yields_none() {
        let mut a = assignment("published");
        a.submission_type = "video".to_string();
        assert!(a.submission_type_enum().is_none());
    }
}
