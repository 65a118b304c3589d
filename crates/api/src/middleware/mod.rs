//! Request pipeline: session bridge → authenticator → CSRF guard → gate.

pub mod authenticator;
pub mod csrf;
pub mod gate;
pub mod session;

pub use authenticator::{AuthAttempt, AuthStrategy, Authenticator, PublicPaths, Resolved, authenticate};
pub use csrf::{IssuedCsrfToken, csrf_guard};
pub use gate::{Gate, gate};
