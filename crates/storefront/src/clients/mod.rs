//! HTTP clients for the backend collaborators.
//!
//! # Architecture
//!
//! - One client per collaborator: cart, catalog, identity, payment, and
//!   postal lookup
//! - Each client implements a small capability trait so the cart and
//!   checkout logic can be exercised against in-memory fakes
//! - The backends are the source of truth - no local sync, direct API calls
//!
//! # Clients
//!
//! - [`CartClient`] - server-backed cart, scoped to one shopper credential
//! - [`CatalogClient`] - batched SKU lookups for cart enrichment
//! - [`IdentityClient`] - sign-in/up, profile, phone, address, card
//! - [`PaymentClient`] - payment validation and charge processing
//! - [`PostalClient`] - postal code to address lookup (best-effort)

mod cart;
mod catalog;
mod identity;
mod payment;
mod postal;

pub use cart::{BasicCart, BasicCartItem, CartApi, CartClient, RemoteCart, RemoteCartItem};
pub use catalog::{CatalogApi, CatalogClient, SkuDetails};
pub use identity::{
    AddressRequest, AuthCredential, CardRequest, IdentityApi, IdentityClient, ProfileDetails,
    ProfileUpdateRequest, SignUpRequest, StoredCardSummary,
};
pub use payment::{
    CardChargeRequest, GatewayReceipt, PaymentApi, PaymentClient, PaymentValidateRequest,
    PaymentValidation, PixChargeRequest, PixReceipt,
};
pub use postal::{PostalAddress, PostalClient, PostalLookupApi};

use thiserror::Error;

/// Errors that can occur when calling a backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (network, DNS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server reports a uniqueness conflict (409).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The backend rejected the request with a message.
    #[error("Backend error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt or error message.
        message: String,
    },
}

/// Body shape the backends use for error responses.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Convert a non-success response into an [`ApiError`].
///
/// Reads the body before classifying so error diagnostics carry whatever
/// the backend said.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return ApiError::RateLimited(retry_after);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| text.chars().take(200).collect());

    match status {
        reqwest::StatusCode::NOT_FOUND => ApiError::NotFound(message),
        reqwest::StatusCode::CONFLICT => ApiError::Conflict(message),
        _ => {
            tracing::error!(
                status = %status,
                body = %message,
                "Backend returned non-success status"
            );
            ApiError::Status {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Parse a successful response body, logging an excerpt on failure.
pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        ApiError::Parse(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("sku 42".to_string());
        assert_eq!(err.to_string(), "Not found: sku 42");

        let err = ApiError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Backend error (500): boom");
    }

    #[test]
    fn test_rate_limited_display() {
        let err = ApiError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }
}
