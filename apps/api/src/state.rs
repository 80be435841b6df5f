use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::realtime::RealtimeHub;
use crate::storage::ObjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Pluggable object store. Production: S3/MinIO; tests swap in memory.
    pub store: Arc<dyn ObjectStore>,
    pub config: Config,
    /// Fan-out hub for live change notifications.
    pub realtime: RealtimeHub,
}
