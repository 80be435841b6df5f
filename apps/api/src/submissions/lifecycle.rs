//! Transition guards for the submission lifecycle:
//! none → draft → submitted → reviewed{approved|revision|rejected}.
//!
//! All guards are pure; the handlers apply them before touching the
//! database and the DB constraints back them up.

use chrono::{DateTime, Utc};

use crate::models::assignment::SubmissionType;
use crate::models::submission::{ReviewResult, SubmissionStatus};

/// Whether a draft may be persisted. Autosave must never clobber a
/// submission that has already advanced.
pub fn can_autosave(status: SubmissionStatus) -> bool {
    status == SubmissionStatus::Draft
}

/// Validity predicate for the draft → submitted transition, per the
/// assignment's submission type.
pub fn is_valid_for_submit(
    submission_type: SubmissionType,
    has_file: bool,
    has_text: bool,
) -> bool {
    match submission_type {
        SubmissionType::File => has_file,
        SubmissionType::Text => has_text,
        SubmissionType::Both => has_file || has_text,
    }
}

/// Whether submitting is allowed at this time. Past the due date only
/// assignments that allow late submission still accept.
pub fn within_submission_window(
    due_at: Option<DateTime<Utc>>,
    allow_late_submission: bool,
    now: DateTime<Utc>,
) -> bool {
    match due_at {
        Some(due) if now > due => allow_late_submission,
        _ => true,
    }
}

/// Only submitted work can be reviewed; review is terminal for the cycle.
pub fn can_review(status: SubmissionStatus) -> bool {
    status == SubmissionStatus::Submitted
}

/// Whether a reviewed submission may start a new cycle. Requires the
/// assignment to allow late submission and a non-approved outcome;
/// `approved` is terminal.
pub fn can_reopen(
    allow_late_submission: bool,
    status: SubmissionStatus,
    review_result: Option<ReviewResult>,
) -> bool {
    allow_late_submission
        && status == SubmissionStatus::Reviewed
        && matches!(
            review_result,
            Some(ReviewResult::Revision) | Some(ReviewResult::Rejected)
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_autosave_only_on_draft() {
        assert!(can_autosave(SubmissionStatus::Draft));
        assert!(!can_autosave(SubmissionStatus::Submitted));
        assert!(!can_autosave(SubmissionStatus::Reviewed));
    }

    #[test]
    fn test_text_assignment_needs_text() {
        assert!(is_valid_for_submit(SubmissionType::Text, false, true));
        assert!(!is_valid_for_submit(SubmissionType::Text, false, false));
        // A file alone does not satisfy a text assignment.
        assert!(!is_valid_for_submit(SubmissionType::Text, true, false));
    }

    #[test]
    fn test_file_assignment_needs_file() {
        assert!(is_valid_for_submit(SubmissionType::File, true, false));
        assert!(!is_valid_for_submit(SubmissionType::File, false, true));
    }

    #[test]
    fn test_both_accepts_either() {
        assert!(is_valid_for_submit(SubmissionType::Both, true, false));
        assert!(is_valid_for_submit(SubmissionType::Both, false, true));
        assert!(is_valid_for_submit(SubmissionType::Both, true, true));
        assert!(!is_valid_for_submit(SubmissionType::Both, false, false));
    }

    #[test]
    fn test_no_due_date_always_open() {
        assert!(within_submission_window(None, false, Utc::now()));
    }

    #[test]
    fn test_past_due_requires_late_flag() {
        let due = Utc::now() - Duration::hours(1);
        assert!(!within_submission_window(Some(due), false, Utc::now()));
        assert!(within_submission_window(Some(due), true, Utc::now()));
    }

    #[test]
    fn test_before_due_always_open() {
        let due = Utc::now() + Duration::hours(1);
        assert!(within_submission_window(Some(due), false, Utc::now()));
    }

    #[test]
    fn test_review_only_on_submitted() {
        assert!(can_review(SubmissionStatus::Submitted));
        assert!(!can_review(SubmissionStatus::Draft));
        assert!(!can_review(SubmissionStatus::Reviewed));
    }

    #[test]
    fn test_reopen_needs_late_flag_and_non_approved_result() {
        assert!(can_reopen(true, SubmissionStatus::Reviewed, Some(ReviewResult::Revision)));
        assert!(can_reopen(true, SubmissionStatus::Reviewed, Some(ReviewResult::Rejected)));
        assert!(!can_reopen(true, SubmissionStatus::Reviewed, Some(ReviewResult::Approved)));
        assert!(!can_reopen(false, SubmissionStatus::Reviewed, Some(ReviewResult::Revision)));
        assert!(!can_reopen(true, SubmissionStatus::Submitted, None));
    }
}
