//! RBAC audit endpoints for transparent authorization debugging.
//!
//! These endpoints provide visibility into roles, permissions and individual
//! authorization decisions ("why was this request denied?"). Mounted behind
//! `role:manage`.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use warden_auth::{Action, Permission, Principal, Resource, Role, explain_authorization};
use warden_core::UserId;

use crate::app::AppState;
use crate::app::errors::{ApiError, json_error};
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Query Parameters
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainQuery {
    pub resource: String,
    pub action: String,
    /// Explain for another user instead of the caller.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Serialize)]
pub struct RoleView {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}

async fn catalog(state: &AppState) -> Result<Vec<(Role, Vec<Permission>)>, ApiError> {
    let mut out = Vec::new();
    for role in state.directory.list_roles().await? {
        let permissions = state.directory.permissions_for_role(role.id).await?;
        out.push((role, permissions));
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/rbac/roles - List all roles and their capabilities
pub async fn list_roles(State(state): State<AppState>) -> Result<Response, ApiError> {
    let roles: Vec<RoleView> = catalog(&state)
        .await?
        .into_iter()
        .map(|(role, permissions)| RoleView {
            role,
            permissions: permissions.iter().map(Permission::capability).collect(),
        })
        .collect();

    Ok((StatusCode::OK, Json(json!({ "roles": roles }))).into_response())
}

/// GET /api/rbac/explain?resource=..&action=..[&userId=..]
pub async fn explain(
    State(state): State<AppState>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<ExplainQuery>,
) -> Result<Response, ApiError> {
    let resource: Resource = match query.resource.parse() {
        Ok(r) => r,
        Err(e) => return Ok(json_error(StatusCode::BAD_REQUEST, "invalid_resource", format!("{e}"))),
    };
    let action: Action = match query.action.parse() {
        Ok(a) => a,
        Err(e) => return Ok(json_error(StatusCode::BAD_REQUEST, "invalid_action", format!("{e}"))),
    };

    let principal = match query.user_id {
        None => ctx.principal().clone(),
        Some(user_id) => match state.directory.get_user(user_id).await? {
            Some(record) => Principal::from(&record),
            None => return Ok(json_error(StatusCode::NOT_FOUND, "not_found", "user not found")),
        },
    };

    let role = state.directory.get_role(principal.role_id).await?;
    let permissions = state.directory.permissions_for_role(principal.role_id).await?;
    let catalog = catalog(&state).await?;

    let explanation = explain_authorization(
        &principal,
        role.as_ref(),
        &permissions,
        &catalog,
        resource,
        action,
    );
    Ok((StatusCode::OK, Json(explanation)).into_response())
}
