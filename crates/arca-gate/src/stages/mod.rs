//! Built-in policy stages.

pub mod operations;
pub mod owner;

pub use operations::{DenyOperationsStage, ReadOnlyStage, RequireRoleStage};
pub use owner::OwnerOnlyStage;
