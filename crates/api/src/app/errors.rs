use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_auth::AuthError;

/// Auth failure surfaced over HTTP.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        Self(value)
    }
}

impl From<warden_auth::DirectoryError> for ApiError {
    fn from(value: warden_auth::DirectoryError) -> Self {
        Self(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        auth_error_to_response(self.0)
    }
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    let (status, code) = match &err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
        AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
        AuthError::InvalidRefreshToken => (StatusCode::UNAUTHORIZED, "invalid_refresh_token"),
        AuthError::UserNotFound => (StatusCode::UNAUTHORIZED, "user_not_found"),
        AuthError::UserInactive => (StatusCode::UNAUTHORIZED, "user_inactive"),
        AuthError::FederationVerificationFailed(_) => {
            (StatusCode::UNAUTHORIZED, "federation_verification_failed")
        }
        AuthError::CsrfMismatch => (StatusCode::FORBIDDEN, "csrf_mismatch"),
        AuthError::PermissionDenied { .. } => (StatusCode::FORBIDDEN, "forbidden"),
        AuthError::RoleRequired { .. } => (StatusCode::FORBIDDEN, "forbidden"),
        AuthError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        AuthError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        AuthError::FederationUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "federation_unavailable"),
        AuthError::Directory(_) | AuthError::Internal(_) => {
            tracing::error!(error = %err, "internal failure");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error");
        }
    };
    json_error(status, code, err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn unauthorized() -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required")
}

#[cfg(test)]
mod tests {
    use warden_auth::{Action, Resource};

    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidRefreshToken, StatusCode::UNAUTHORIZED),
            (AuthError::UserInactive, StatusCode::UNAUTHORIZED),
            (AuthError::CsrfMismatch, StatusCode::FORBIDDEN),
            (
                AuthError::PermissionDenied {
                    resource: Resource::Project,
                    action: Action::Delete,
                },
                StatusCode::FORBIDDEN,
            ),
            (AuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Conflict("x".into()), StatusCode::CONFLICT),
            (AuthError::FederationUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (AuthError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(auth_error_to_response(err).status(), status);
        }
    }
}
