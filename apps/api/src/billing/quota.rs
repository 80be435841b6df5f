use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

/// Calendar period key for a usage counter, "YYYY-MM" in UTC. Counters are
/// never zeroed; a new month simply keys a fresh row.
pub fn period_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Units consumed by `user_id` in the period containing `at`.
pub async fn current_usage(
    pool: &PgPool,
    user_id: Uuid,
    at: DateTime<Utc>,
) -> Result<i32, AppError> {
    let used: Option<i32> =
        sqlx::query_scalar("SELECT used FROM usage_counters WHERE user_id = $1 AND period = $2")
            .bind(user_id)
            .bind(period_key(at))
            .fetch_optional(pool)
            .await?;
    Ok(used.unwrap_or(0))
}

/// Consumes one quota unit, atomically. This is the authoritative
/// increment-and-check: a single statement that only takes effect while
/// `used` is below the plan's limit, so two racing requests can never both
/// win the last unit. Zero affected rows means the quota is exhausted.
pub async fn record_usage(
    pool: &PgPool,
    user_id: Uuid,
    monthly_limit: i32,
    at: DateTime<Utc>,
) -> Result<i32, AppError> {
    if monthly_limit <= 0 {
        return Err(AppError::QuotaExceeded);
    }

    let period = period_key(at);
    let new_used: Option<i32> = sqlx::query_scalar(
        r#"
        INSERT INTO usage_counters (user_id, period, used, updated_at)
        VALUES ($1, $2, 1, now())
        ON CONFLICT (user_id, period)
        DO UPDATE SET used = usage_counters.used + 1, updated_at = now()
        WHERE usage_counters.used < $3
        RETURNING used
        "#,
    )
    .bind(user_id)
    .bind(&period)
    .bind(monthly_limit)
    .fetch_optional(pool)
    .await?;

    match new_used {
        Some(used) => {
            info!("Recorded usage for user {user_id}: {used}/{monthly_limit} in {period}");
            Ok(used)
        }
        None => Err(AppError::QuotaExceeded),
    }
}

/// Admin-only: zeroes the user's counter for the current period.
pub async fn reset_current_usage(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE usage_counters SET used = 0, updated_at = now() WHERE user_id = $1 AND period = $2",
    )
    .bind(user_id)
    .bind(period_key(Utc::now()))
    .execute(pool)
    .await?;
    info!("Reset current-period usage for user {user_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_key_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(period_key(at), "2026-03");
    }

    #[test]
    fn test_period_key_zero_pads_month() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(period_key(at), "2025-01");
    }

    #[test]
    fn test_adjacent_months_never_share_a_period() {
        let end = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_ne!(period_key(end), period_key(start));
    }

    #[test]
    fn test_same_month_shares_a_period() {
        let a = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 7, 31, 12, 0, 0).unwrap();
        assert_eq!(period_key(a), period_key(b));
    }

    #[test]
    fn test_year_boundary() {
        let dec = Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap();
        let jan = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        assert_eq!(period_key(dec), "2025-12");
        assert_eq!(period_key(jan), "2026-01");
    }
}
