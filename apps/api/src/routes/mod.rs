pub mod health;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::billing::handlers as billing;
use crate::feedback;
use crate::state::AppState;
use crate::submissions::handlers as submissions;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Billing / entitlements
        .route("/api/v1/billing/access", get(billing::handle_get_access))
        .route("/api/v1/billing/usage", post(billing::handle_record_usage))
        .route("/api/v1/billing/cancel", post(billing::handle_cancel))
        .route(
            "/api/v1/billing/reactivate",
            post(billing::handle_reactivate),
        )
        .route(
            "/api/v1/admin/users/:id/plan",
            post(billing::handle_admin_change_plan),
        )
        .route(
            "/api/v1/admin/users/:id/usage/reset",
            post(billing::handle_admin_reset_usage),
        )
        // Submissions
        .route(
            "/api/v1/submissions/draft",
            put(submissions::handle_save_draft),
        )
        .route(
            "/api/v1/assignments/:id/files",
            post(submissions::handle_upload_file),
        )
        .route(
            "/api/v1/assignments/:id/submission",
            get(submissions::handle_get_my_submission),
        )
        .route(
            "/api/v1/submissions/:id/submit",
            post(submissions::handle_submit),
        )
        .route(
            "/api/v1/submissions/:id/review",
            post(submissions::handle_review),
        )
        .route(
            "/api/v1/submissions/:id/reopen",
            post(submissions::handle_reopen),
        )
        // Feedback items
        .route(
            "/api/v1/feedback",
            post(feedback::handle_create).get(feedback::handle_list),
        )
        .route("/api/v1/feedback/:id", patch(feedback::handle_update))
        .with_state(state)
}
