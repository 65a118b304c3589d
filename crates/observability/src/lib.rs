//! Process-wide tracing/logging setup.

pub mod tracing;

pub use crate::tracing::{LogFormat, init};
