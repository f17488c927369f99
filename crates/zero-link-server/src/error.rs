use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use zero_link_auth::OAuthError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    OAuth(#[from] OAuthError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// HTTP status for an engine error
pub fn oauth_status(error: &OAuthError) -> StatusCode {
    match error {
        OAuthError::UnknownProvider(_)
        | OAuthError::ProviderDisabled(_)
        | OAuthError::IdentityNotFound
        | OAuthError::UserNotFound => StatusCode::NOT_FOUND,
        OAuthError::InvalidOrExpiredState
        | OAuthError::AuthorizationDenied { .. }
        | OAuthError::InvalidManualLinkTicket => StatusCode::BAD_REQUEST,
        OAuthError::TokenExchangeFailed(_) | OAuthError::ProfileFetchFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        OAuthError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        OAuthError::EmailRequired => StatusCode::UNPROCESSABLE_ENTITY,
        OAuthError::ManualLinkRequired { .. }
        | OAuthError::AlreadyLinkedToAnotherUser
        | OAuthError::CannotRemoveLastAuthMethod => StatusCode::CONFLICT,
        OAuthError::DecryptionFailed | OAuthError::ReauthenticationRequired(_) => {
            StatusCode::UNAUTHORIZED
        }
        OAuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// User-facing message; internal failures stay generic
fn oauth_message(error: &OAuthError) -> String {
    match error {
        OAuthError::UnknownProvider(_) | OAuthError::ProviderDisabled(_) => {
            "Unknown provider".to_string()
        }
        OAuthError::InvalidOrExpiredState => "Sign-in expired, please try again".to_string(),
        error if error.is_internal() => "An internal error occurred".to_string(),
        error => error.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, code, message, details) = match self {
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg, None)
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing or invalid session".to_string(),
                None,
            ),
            ApiError::OAuth(err) => {
                if err.is_internal() {
                    tracing::error!(error = %err, "OAuth engine failure");
                }
                let details = match &err {
                    OAuthError::ManualLinkRequired { ticket, email } => {
                        Some(serde_json::json!({ "ticket": ticket, "email": email }))
                    }
                    OAuthError::RateLimited {
                        retry_after_seconds,
                    } => {
                        retry_after = Some(*retry_after_seconds);
                        Some(serde_json::json!({ "retry_after_seconds": retry_after_seconds }))
                    }
                    _ => None,
                };
                (oauth_status(&err), err.code(), oauth_message(&err), details)
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorDetails {
                code: code.to_string(),
                message,
                details,
            },
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
