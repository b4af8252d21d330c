use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Every failure a handler can surface.
///
/// Domain kinds map to specific client errors. `Infrastructure` and
/// `RollbackFailed` are logged and answered with an opaque 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    DuplicateIdentity(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Invalid email/password")]
    CredentialInvalid,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InUse(&'static str),
    #[error("Forbidden")]
    Forbidden,
    #[error("You are already logged in")]
    AlreadyAuthenticated,
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
    #[error("rollback failed ({rollback}) after: {original}")]
    RollbackFailed {
        original: Box<AppError>,
        rollback: anyhow::Error,
    },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DuplicateIdentity(_) | AppError::InUse(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CredentialInvalid => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::AlreadyAuthenticated => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Infrastructure(_) | AppError::RollbackFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::Infrastructure(_) | AppError::RollbackFailed { .. }
        )
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.is_infrastructure() {
            // never leak storage or hashing details to clients
            error!(error = ?self, "request failed");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
