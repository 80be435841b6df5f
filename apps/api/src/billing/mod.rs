pub mod cancellation;
pub mod handlers;
pub mod quota;
pub mod reconcile;
pub mod resolver;
