//! `warden-core`: shared primitives for the auth workspace.
//!
//! This crate contains **pure** building blocks (no HTTP, no storage).

pub mod error;
pub mod id;
pub mod mode;

pub use error::DomainError;
pub use id::{PermissionId, RoleId, UserId};
pub use mode::DeploymentMode;
