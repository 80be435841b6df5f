use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{ProfileRow, Role};
use crate::state::AppState;

/// Identity header set by the upstream gateway after token verification.
/// This service re-checks roles and ownership on every mutating route; the
/// header is who the caller is, not what they may do.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The resolved caller: profile row plus parsed role. Built per-request and
/// passed explicitly into handlers; there is no ambient session singleton.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: Uuid,
    pub role: Role,
    /// Full profile row for handlers that need display fields.
    #[allow(dead_code)]
    pub profile: ProfileRow,
}

impl AuthedUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_reviewer(&self) -> Result<(), AppError> {
        if self.role.can_review() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let user_id = Uuid::parse_str(raw).map_err(|_| AppError::Unauthorized)?;

        let profile: Option<ProfileRow> = sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
        let profile = profile.ok_or(AppError::Unauthorized)?;

        let role = Role::parse(&profile.role).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Profile {user_id} carries unknown role '{}'",
                profile.role
            ))
        })?;

        Ok(AuthedUser {
            id: profile.id,
            role,
            profile,
        })
    }
}
