use bytes::Bytes;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::assignment::AssignmentRow;
use crate::storage::{ObjectStore, StoredFile};

/// Lowercase extension of a filename, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    let trimmed = name.trim();
    let (stem, ext) = trimmed.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Pre-upload validation. Failures are local and must prevent any storage
/// call: fail fast, no partial upload.
pub fn validate_file(name: &str, size: i64, assignment: &AssignmentRow) -> Result<(), AppError> {
    if size > assignment.max_file_size {
        return Err(AppError::Validation(format!(
            "File exceeds the {} byte limit for this assignment",
            assignment.max_file_size
        )));
    }

    let ext = file_extension(name).ok_or_else(|| {
        AppError::Validation("File name has no recognizable extension".to_string())
    })?;
    if !assignment
        .allowed_file_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    {
        return Err(AppError::Validation(format!(
            "File type '.{ext}' is not accepted; allowed: {}",
            assignment.allowed_file_types.join(", ")
        )));
    }
    Ok(())
}

/// Validates and stores an upload, returning the stored-file reference
/// persisted on the submission row. Either yields a reference or an error;
/// there is no partial state.
pub async fn upload_submission_file(
    store: &dyn ObjectStore,
    user_id: Uuid,
    assignment: &AssignmentRow,
    file_name: &str,
    body: Bytes,
) -> Result<StoredFile, AppError> {
    let size = body.len() as i64;
    validate_file(file_name, size, assignment)?;

    let key = format!("submissions/{}/{}/{}", assignment.id, user_id, file_name);
    let url = store.put(&key, body, "application/octet-stream").await?;

    Ok(StoredFile {
        url,
        name: file_name.to_string(),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryObjectStore;
    use chrono::Utc;

    fn assignment(max_size: i64, types: &[&str]) -> AssignmentRow {
        AssignmentRow {
            id: Uuid::new_v4(),
            espaco_id: Uuid::new_v4(),
            title: "Week 3 case study".to_string(),
            description: String::new(),
            due_at: None,
            submission_type: "file".to_string(),
            max_file_size: max_size,
            allowed_file_types: types.iter().map(|s| s.to_string()).collect(),
            status: "published".to_string(),
            allow_late_submission: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_extension_lowercased() {
        assert_eq!(file_extension("Report.PDF"), Some("pdf".to_string()));
        assert_eq!(file_extension("notes.tar.gz"), Some("gz".to_string()));
    }

    #[test]
    fn test_extension_missing() {
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".gitignore"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_accepts_allowed_type_within_limit() {
        let a = assignment(1024, &["pdf", "docx"]);
        assert!(validate_file("essay.pdf", 500, &a).is_ok());
    }

    #[test]
    fn test_rejects_oversized_file() {
        let a = assignment(1024, &["pdf"]);
        assert!(matches!(
            validate_file("essay.pdf", 2048, &a),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        let a = assignment(1024, &["pdf"]);
        assert!(matches!(
            validate_file("malware.exe", 10, &a),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_extension_check_case_insensitive() {
        let a = assignment(1024, &["PDF"]);
        assert!(validate_file("essay.pdf", 10, &a).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_file_never_reaches_storage() {
        let store = MemoryObjectStore::default();
        let a = assignment(10, &["pdf"]);
        let result = upload_submission_file(
            &store,
            Uuid::new_v4(),
            &a,
            "too-big.pdf",
            Bytes::from(vec![0u8; 50]),
        )
        .await;
        assert!(result.is_err());
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_upload_yields_reference() {
        let store = MemoryObjectStore::default();
        let a = assignment(1024, &["pdf"]);
        let stored = upload_submission_file(
            &store,
            Uuid::new_v4(),
            &a,
            "essay.pdf",
            Bytes::from_static(b"content"),
        )
        .await
        .unwrap();
        assert_eq!(stored.name, "essay.pdf");
        assert_eq!(stored.size, 7);
        assert_eq!(store.objects.lock().unwrap().len(), 1);
    }
}
