#![allow(dead_code)]

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::submission::SubmissionRow;
use crate::storage::StoredFile;

/// Draft content carried by one autosave request.
#[derive(Debug, Clone, Default)]
pub struct DraftContent {
    pub text_content: Option<String>,
    pub file: Option<StoredFile>,
}

impl DraftContent {
    /// Autosave only fires with at least one non-empty field.
    pub fn is_empty(&self) -> bool {
        let no_text = self
            .text_content
            .as_deref()
            .map(|t| t.trim().is_empty())
            .unwrap_or(true);
        no_text && self.file.is_none()
    }
}

/// Result of a draft save. `Superseded` and `Stale` are expected outcomes
/// shown as a non-blocking indicator, not failures that interrupt the user.
#[derive(Debug)]
pub enum DraftSaveOutcome {
    Saved(SubmissionRow),
    /// The submission advanced past draft; the save was refused.
    Superseded,
    /// Another save got there first; the caller refetches and retries with
    /// the fresh version.
    Stale { current_version: i32 },
}

/// Persists draft content for (user, assignment), creating the row on the
/// first save. A single statement guarded on `status = 'draft'` and the
/// version the client last saw, so a save can never clobber a submitted
/// submission or a newer draft.
///
/// Absent fields mean "unchanged": a file-only save keeps the stored text
/// and a text-only save keeps the stored file. Sending an empty string
/// clears the text explicitly.
pub async fn save_draft(
    pool: &PgPool,
    user_id: Uuid,
    assignment_id: Uuid,
    content: &DraftContent,
    last_seen_version: i32,
) -> Result<DraftSaveOutcome, AppError> {
    if content.is_empty() {
        return Err(AppError::Validation(
            "Nothing to save: draft content is empty".to_string(),
        ));
    }

    let (file_url, file_name, file_size) = match &content.file {
        Some(f) => (Some(f.url.clone()), Some(f.name.clone()), Some(f.size)),
        None => (None, None, None),
    };

    let saved: Option<SubmissionRow> = sqlx::query_as(
        r#"
        INSERT INTO submissions
            (id, user_id, assignment_id, status, text_content, file_url, file_name, file_size)
        VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7)
        ON CONFLICT (user_id, assignment_id) DO UPDATE
        SET text_content = COALESCE(EXCLUDED.text_content, submissions.text_content),
            file_url = COALESCE(EXCLUDED.file_url, submissions.file_url),
            file_name = COALESCE(EXCLUDED.file_name, submissions.file_name),
            file_size = COALESCE(EXCLUDED.file_size, submissions.file_size),
            version = submissions.version + 1,
            updated_at = now()
        WHERE submissions.status = 'draft' AND submissions.version = $8
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(assignment_id)
    .bind(&content.text_content)
    .bind(file_url)
    .bind(file_name)
    .bind(file_size)
    .bind(last_seen_version)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = saved {
        return Ok(DraftSaveOutcome::Saved(row));
    }

    // The guarded upsert matched nothing: either the submission advanced or
    // the client's version is stale.
    let existing: Option<SubmissionRow> = sqlx::query_as(
        "SELECT * FROM submissions WHERE user_id = $1 AND assignment_id = $2",
    )
    .bind(user_id)
    .bind(assignment_id)
    .fetch_optional(pool)
    .await?;

    match existing {
        Some(row) if row.status != "draft" => Ok(DraftSaveOutcome::Superseded),
        Some(row) => Ok(DraftSaveOutcome::Stale {
            current_version: row.version,
        }),
        None => Err(AppError::NotFound(
            "Submission disappeared during save".to_string(),
        )),
    }
}

/// Debounced autosave timer. Each `schedule` call replaces any pending
/// save; `cancel` drops the pending save entirely, which is how an explicit
/// submit supersedes an in-flight autosave.
pub struct AutosaveScheduler {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

/// Debounce interval between autosaves.
pub const AUTOSAVE_DELAY: Duration = Duration::from_secs(30);

impl AutosaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedules `save` to run after the debounce delay, replacing any
    /// previously scheduled save.
    pub fn schedule<F>(&self, save: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            save.await;
        });
        if let Some(previous) = self.pending.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Drops any pending save. Called when the user submits explicitly:
    /// submission wins over a near-simultaneous autosave.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_empty_content_detection() {
        assert!(DraftContent::default().is_empty());
        assert!(DraftContent {
            text_content: Some("   ".to_string()),
            file: None,
        }
        .is_empty());
        assert!(!DraftContent {
            text_content: Some("draft text".to_string()),
            file: None,
        }
        .is_empty());
        assert!(!DraftContent {
            text_content: None,
            file: Some(StoredFile {
                url: "s3://bucket/key".to_string(),
                name: "essay.pdf".to_string(),
                size: 10,
            }),
        }
        .is_empty());
    }

    #[test]
    fn test_file_only_save_carries_no_text_overwrite() {
        // A save triggered by a file upload has text_content = None, which
        // the upsert treats as "leave the stored text alone". Only an
        // explicit Some("") clears it.
        let content = DraftContent {
            text_content: None,
            file: Some(StoredFile {
                url: "s3://bucket/submissions/a/b/essay.pdf".to_string(),
                name: "essay.pdf".to_string(),
                size: 42,
            }),
        };
        assert!(!content.is_empty());
        assert!(content.text_content.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_save_fires_after_delay() {
        let scheduler = AutosaveScheduler::new(Duration::from_secs(30));
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        scheduler.schedule(async move {
            f.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_save() {
        let scheduler = AutosaveScheduler::new(Duration::from_secs(30));
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        scheduler.schedule(async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(10)).await;

        let f = fired.clone();
        scheduler.schedule(async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(60)).await;

        // Only the second save runs.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_supersedes_pending_save() {
        let scheduler = AutosaveScheduler::new(Duration::from_secs(30));
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        scheduler.schedule(async move {
            f.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
