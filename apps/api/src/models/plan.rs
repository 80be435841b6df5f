#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Lowest tier every user falls back to when no subscription row exists.
pub const BASIC_PLAN_ID: &str = "basic";

/// Subscription tier reference data. Immutable at runtime; edited only by
/// administrators.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanRow {
    /// Text slug, e.g. "basic", "pro", "premium".
    pub id: String,
    pub name: String,
    pub price_monthly_cents: i64,
    pub price_annual_cents: i64,
    /// Metered analyses allowed per calendar month.
    pub monthly_limit: i32,
    /// Capability map: booleans and small integers keyed by capability name
    /// (library_access, pdf_export, concierge_slots, ...).
    pub features: Value,
    /// Marketing bullets, display only.
    pub highlights: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PlanRow {
    /// Quota units left this month. Saturates at zero.
    pub fn remaining(&self, used_this_month: i32) -> i32 {
        (self.monthly_limit - used_this_month).max(0)
    }

    pub fn feature_enabled(&self, key: &str) -> bool {
        match self.features.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0) > 0,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(limit: i32, features: Value) -> PlanRow {
        PlanRow {
            id: "basic".to_string(),
            name: "Basic".to_string(),
            price_monthly_cents: 0,
            price_annual_cents: 0,
            monthly_limit: limit,
            features,
            highlights: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_remaining_normal() {
        assert_eq!(plan(5, json!({})).remaining(2), 3);
    }

    #[test]
    fn test_remaining_exhausted() {
        assert_eq!(plan(1, json!({})).remaining(1), 0);
    }

    #[test]
    fn test_remaining_never_negative() {
        // Transient overshoot before a block is enforced must not leak
        // through as a negative remainder.
        assert_eq!(plan(1, json!({})).remaining(3), 0);
    }

    #[test]
    fn test_feature_enabled_bool() {
        let p = plan(1, json!({"library_access": true, "pdf_export": false}));
        assert!(p.feature_enabled("library_access"));
        assert!(!p.feature_enabled("pdf_export"));
    }

    #[test]
    fn test_feature_enabled_counted_slot() {
        let p = plan(1, json!({"concierge_slots": 2}));
        assert!(p.feature_enabled("concierge_slots"));
        assert!(!plan(1, json!({"concierge_slots": 0})).feature_enabled("concierge_slots"));
    }

    #[test]
    fn test_feature_enabled_missing_key() {
        assert!(!plan(1, json!({})).feature_enabled("pdf_export"));
    }
}
