//! [`warden_auth::UserDirectory`] implementations.

pub mod in_memory;

pub use in_memory::InMemoryDirectory;
