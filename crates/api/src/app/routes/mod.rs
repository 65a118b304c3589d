use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use warden_auth::{Action, Resource};

use crate::app::AppState;
use crate::middleware::{Gate, gate};

pub mod auth;
pub mod content;
pub mod rbac;
pub mod system;

/// Everything under `/api`.
pub fn router(state: &AppState) -> Router<AppState> {
    let rbac = Router::new()
        .route("/rbac/roles", get(rbac::list_roles))
        .route("/rbac/explain", get(rbac::explain))
        .route_layer(from_fn_with_state(
            Gate::permission(state, Resource::Role, Action::Manage),
            gate,
        ));

    Router::new()
        .route("/health", get(system::health))
        .route("/csrf-token", get(auth::csrf_token))
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/federated-login", post(auth::federated_login))
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/current-user", get(auth::current_user))
        .merge(content::router(state))
        .merge(rbac)
}
