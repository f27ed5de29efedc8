//! Error taxonomy shared by the stores and the HTTP handlers.
//!
//! Every variant maps to a status code and a `{"error": "..."}` body. Storage
//! failures are logged and reported as a generic `server error`; they fail the
//! request, never the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Panel id does not resolve.
    #[error("unknown panel")]
    UnknownPanel,

    /// Panel key does not resolve.
    #[error("invalid key")]
    InvalidKey,

    /// Panel key does not resolve on the acknowledge path.
    #[error("invalid panel")]
    InvalidPanel,

    /// User id does not resolve.
    #[error("unknown user")]
    UnknownUser,

    /// Command id does not resolve under the given panel.
    #[error("command not found")]
    CommandNotFound,

    /// A required input field is absent or empty.
    #[error("missing {0}")]
    MissingField(&'static str),

    /// Freshly generated panel key collided with an existing one.
    #[error("duplicate panel key")]
    DuplicateKey,

    /// Email exists but the credential does not verify.
    #[error("invalid credential")]
    InvalidCredential,

    /// Argon2 failed to produce a hash.
    #[error("password hashing failed")]
    PasswordHash,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownPanel | Self::InvalidKey | Self::UnknownUser | Self::CommandNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidPanel => StatusCode::FORBIDDEN,
            Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::DuplicateKey | Self::PasswordHash | Self::Database(_) | Self::Migrate(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(RelayError::InvalidKey.status(), StatusCode::NOT_FOUND);
        assert_eq!(RelayError::InvalidPanel.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            RelayError::MissingField("id").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::Database(sqlx::Error::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    async fn body_of(err: RelayError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_storage_failure_hides_details() {
        let (status, body) = body_of(RelayError::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "server error"}));
    }

    #[tokio::test]
    async fn test_client_error_body_carries_message() {
        let (status, body) = body_of(RelayError::InvalidPanel).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"error": "invalid panel"}));
    }

    #[test]
    fn test_missing_field_message() {
        assert_eq!(RelayError::MissingField("id").to_string(), "missing id");
    }
}
