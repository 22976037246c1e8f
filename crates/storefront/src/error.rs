//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cart::CartError;
use crate::checkout::{PaymentError, ProvisioningError};
use crate::clients::ApiError;

/// Application-level error type for the storefront.
///
/// A refused checkout step transition is not in here: the step handler
/// answers 422 with the parked wizard state itself.
#[derive(Debug, Error)]
pub enum AppError {
    /// Locally detected validation failure; never reached the network.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Server reported a uniqueness conflict (duplicate email/tax id).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A backend call failed in transit.
    #[error("Communication error: {0}")]
    Communication(#[from] ApiError),

    /// Account provisioning stopped partway.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// The payment gateway refused the charge.
    #[error("Payment failed: {0}")]
    Gateway(String),

    /// Rate limited by a backend.
    #[error("Rate limited")]
    RateLimited,

    /// Session layer failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound(sku) => Self::NotFound(format!("cart item for sku {sku}")),
            CartError::InvalidItem(sku) => {
                Self::Validation(format!("cart item for sku {sku} cannot be changed"))
            }
            CartError::Api(e) => e.into(),
            CartError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(message) => Self::Validation(message),
            PaymentError::Gateway(message) => Self::Gateway(message),
            PaymentError::Api(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Communication(_) | Self::Provisioning(_) | Self::Session(_) | Self::Internal(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Communication(e) => match e {
                ApiError::NotFound(_) => StatusCode::NOT_FOUND,
                ApiError::Conflict(_) => StatusCode::CONFLICT,
                ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Provisioning(_) => StatusCode::BAD_GATEWAY,
            Self::Gateway(_) => StatusCode::PAYMENT_REQUIRED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Communication(e) => match e {
                ApiError::NotFound(what) => format!("Not found: {what}"),
                ApiError::Conflict(what) => what.clone(),
                ApiError::RateLimited(_) => "Too many requests, slow down".to_string(),
                _ => "External service error".to_string(),
            },
            Self::Provisioning(e) => format!("Account setup failed at {}", e.stage()),
            // Gateway messages are surfaced verbatim when the provider
            // supplied one.
            Self::Gateway(message) => message.clone(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a profile ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
