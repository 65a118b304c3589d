//! Infrastructure layer: storage adapters and startup maintenance tasks.

pub mod content;
pub mod directory;
pub mod migration;
pub mod seed;

pub use content::{BlogPost, ContentStore, InMemoryContentStore, Invoice, Project};
pub use directory::InMemoryDirectory;
pub use migration::{MigrationReport, migrate_legacy_secrets};
pub use seed::{SeedReport, bootstrap_admin, seed_default_rbac};
