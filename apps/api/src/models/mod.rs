pub mod assignment;
pub mod plan;
pub mod profile;
pub mod submission;
pub mod subscription;
