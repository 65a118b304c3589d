//! Sample content behind the authorization gate.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{MethodRouter, delete, get, put},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use warden_auth::{Action, Resource};
use warden_infra::ContentStore;

use crate::app::AppState;
use crate::app::errors::json_error;
use crate::middleware::{Gate, gate};

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: String,
}

/// One route guarded by one capability.
fn guarded(
    state: &AppState,
    path: &str,
    method_router: MethodRouter<AppState>,
    resource: Resource,
    action: Action,
) -> Router<AppState> {
    Router::new()
        .route(path, method_router)
        .route_layer(from_fn_with_state(Gate::permission(state, resource, action), gate))
}

pub fn router(state: &AppState) -> Router<AppState> {
    use Action::{Delete, Read, Update};

    Router::new()
        .merge(guarded(state, "/projects/:id", get(read_project), Resource::Project, Read))
        .merge(guarded(state, "/projects/:id", put(update_project), Resource::Project, Update))
        .merge(guarded(state, "/projects/:id", delete(delete_project), Resource::Project, Delete))
        .merge(guarded(state, "/invoices/:id", get(read_invoice), Resource::Invoice, Read))
        .merge(guarded(state, "/blog-posts", get(list_blog_posts), Resource::BlogPost, Read))
        // Single posts are public (see `PublicPaths`).
        .route("/blog-posts/:id", get(read_blog_post))
        .route("/public/announcements", get(announcements))
}

fn not_found(what: &str) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub async fn read_project(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.content.projects.get(id) {
        Some(project) => Json(project).into_response(),
        None => not_found("project"),
    }
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProjectRequest>,
) -> axum::response::Response {
    let name = req.name.trim();
    if name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "validation_error", "name is required");
    }
    let Some(mut project) = state.content.projects.get(id) else {
        return not_found("project");
    };
    project.name = name.to_string();
    project.updated_at = Utc::now();
    state.content.projects.upsert(id, project.clone());
    Json(project).into_response()
}

pub async fn delete_project(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.content.projects.remove(id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found("project"),
    }
}

pub async fn read_invoice(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.content.invoices.get(id) {
        Some(invoice) => Json(invoice).into_response(),
        None => not_found("invoice"),
    }
}

pub async fn list_blog_posts(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "posts": state.content.blog_posts.list() }))
}

pub async fn read_blog_post(State(state): State<AppState>, Path(id): Path<i64>) -> axum::response::Response {
    match state.content.blog_posts.get(id) {
        Some(post) => Json(post).into_response(),
        None => not_found("blog post"),
    }
}

pub async fn announcements(State(state): State<AppState>) -> impl IntoResponse {
    let titles: Vec<String> = state
        .content
        .blog_posts
        .list()
        .into_iter()
        .map(|p| p.title)
        .collect();
    Json(json!({ "announcements": titles }))
}
