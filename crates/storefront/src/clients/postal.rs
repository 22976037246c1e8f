//! Postal-code lookup client.
//!
//! Best-effort shipping autofill: a CEP resolves to street, neighborhood,
//! city, and state. Failures never block checkout - the caller gets `None`
//! and the shopper types the address by hand.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiError, parse_json};

/// Capability contract for the postal lookup backend.
pub trait PostalLookupApi: Send + Sync {
    /// Resolve a postal code (CEP digits) to an address, best-effort.
    fn lookup(
        &self,
        postal_code: &str,
    ) -> impl Future<Output = Result<Option<PostalAddress>, ApiError>> + Send;
}

/// Address data resolved from a postal code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    /// Street name.
    pub street: Option<String>,
    /// Neighborhood.
    pub neighborhood: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State (two-letter code).
    pub state: Option<String>,
}

/// HTTP client for the postal lookup backend.
#[derive(Clone)]
pub struct PostalClient {
    inner: Arc<PostalClientInner>,
}

struct PostalClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl PostalClient {
    /// Create a new postal lookup client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            inner: Arc::new(PostalClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
        }
    }
}

impl PostalLookupApi for PostalClient {
    #[instrument(skip(self))]
    async fn lookup(&self, postal_code: &str) -> Result<Option<PostalAddress>, ApiError> {
        let digits: String = postal_code.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != 8 {
            return Ok(None);
        }

        let response = self
            .inner
            .client
            .get(format!("{}/cep/{digits}", self.inner.base_url))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }

        let address: PostalAddress = parse_json(response).await?;
        Ok(Some(address))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_postal_address_deserialize() {
        let json = r#"{"street":"Rua A","neighborhood":"Centro","city":"Sao Paulo","state":"SP"}"#;
        let addr: PostalAddress = serde_json::from_str(json).unwrap();
        assert_eq!(addr.city.as_deref(), Some("Sao Paulo"));
    }
}
