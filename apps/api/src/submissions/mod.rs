pub mod autosave;
pub mod files;
pub mod handlers;
pub mod lifecycle;
