//! Route-level authorization gate.
//!
//! Attached at route registration:
//!
//! ```ignore
//! Router::new()
//!     .route("/projects/:id", delete(delete_project))
//!     .route_layer(from_fn_with_state(Gate::permission(&state, Resource::Project, Action::Delete), gate))
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use warden_auth::{Action, Decision, Resource, UserDirectory, authorize, require_role};
use warden_core::RoleId;

use crate::app::AppState;
use crate::app::errors::{ApiError, unauthorized};
use crate::context::PrincipalContext;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Requirement {
    Permission(Resource, Action),
    Role(RoleId),
}

/// State for [`gate`]: what to require and where permissions come from.
#[derive(Clone)]
pub struct Gate {
    directory: Arc<dyn UserDirectory>,
    requirement: Requirement,
}

impl Gate {
    pub fn permission(state: &AppState, resource: Resource, action: Action) -> Self {
        Self {
            directory: state.directory.clone(),
            requirement: Requirement::Permission(resource, action),
        }
    }

    pub fn role(state: &AppState, role_id: RoleId) -> Self {
        Self {
            directory: state.directory.clone(),
            requirement: Requirement::Role(role_id),
        }
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    async fn decide(&self, ctx: &PrincipalContext) -> Result<Decision, ApiError> {
        Ok(match self.requirement {
            Requirement::Permission(resource, action) => {
                let permissions = self.directory.permissions_for_role(ctx.role_id()).await?;
                authorize(&permissions, resource, action)
            }
            Requirement::Role(required) => require_role(ctx.principal(), required),
        })
    }
}

pub async fn gate(State(gate): State<Gate>, req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<PrincipalContext>().cloned() else {
        return unauthorized();
    };

    let decision = match gate.decide(&ctx).await {
        Ok(decision) => decision,
        Err(e) => return e.into_response(),
    };

    match decision.into_result() {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::info!(
                user_id = %ctx.user_id(),
                role_id = %ctx.role_id(),
                requirement = ?gate.requirement,
                "authorization denied"
            );
            ApiError(e).into_response()
        }
    }
}
