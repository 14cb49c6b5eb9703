//! Lifecycle error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::error::{ErrorBody, FitgateError};

/// Errors produced by the lifecycle actions.
///
/// Authorization and validation errors short-circuit with no partial
/// effect; `Storage` surfaces only when an authoritative remote write
/// fails (non-authoritative failures are logged and swallowed inside
/// the flows).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Missing or invalid caller credential.
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but insufficient role or organization mismatch.
    #[error("{reason}")]
    Forbidden {
        /// Human-readable reason returned to the caller.
        reason: String,
    },

    /// Missing or malformed required request field.
    #[error("{message}")]
    Validation {
        /// Human-readable description of the problem.
        message: String,
    },

    /// The caller's profile has no organization id.
    #[error("Caller has no organization")]
    CallerHasNoOrganization,

    /// The target user belongs to a different organization.
    #[error("This user belongs to another organization")]
    ForeignOrganization,

    /// The target already set their own password; admins may not reset it.
    #[error("Users who have set their own password cannot have it reset by an admin")]
    PasswordAlreadyChanged,

    /// The target user has no profile row.
    #[error("User not found")]
    NotFound,

    /// An authoritative remote write failed.
    #[error("{0}")]
    Storage(#[from] FitgateError),
}

impl LifecycleError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// HTTP status code for this error.
    ///
    /// Matches the admin dashboard's expectations: classification
    /// rejections on invite are client errors (400), while delete's
    /// organization checks are expressed as `Forbidden` by the flow
    /// itself and map to 403 here.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Validation { .. }
            | Self::CallerHasNoOrganization
            | Self::ForeignOrganization
            | Self::PasswordAlreadyChanged => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Storage(e) => {
                // Storage errors keep their own mapping so a 404 from a
                // lookup does not masquerade as a server fault.
                let status = e.status_code();
                if status.is_client_error() {
                    status
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Lifecycle action failed");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;
