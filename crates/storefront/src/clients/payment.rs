//! Payment backend client.
//!
//! Three operations: an eligibility validation issued before any charge,
//! credit-card processing, and PIX processing. Gateway failure messages
//! are preserved verbatim so the checkout can surface them to the shopper.

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use varejo_core::{AddressId, CardId, OrderId};

use super::{ApiError, error_from_response, parse_json};

/// Capability contract for the payment backend.
pub trait PaymentApi: Send + Sync {
    /// Server-side eligibility check run before either charge flow.
    fn validate(
        &self,
        credential: &str,
        request: &PaymentValidateRequest,
    ) -> impl Future<Output = Result<PaymentValidation, ApiError>> + Send;

    /// Process a credit-card charge.
    fn charge_card(
        &self,
        credential: &str,
        request: &CardChargeRequest,
    ) -> impl Future<Output = Result<GatewayReceipt, ApiError>> + Send;

    /// Process a PIX charge.
    fn charge_pix(
        &self,
        credential: &str,
        request: &PixChargeRequest,
    ) -> impl Future<Output = Result<PixReceipt, ApiError>> + Send;
}

// =============================================================================
// Wire Types
// =============================================================================

/// Eligibility check payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentValidateRequest {
    /// Chosen delivery address.
    pub address_id: Option<AddressId>,
    /// Chosen stored card, when paying with one.
    pub card_id: Option<CardId>,
}

/// Eligibility check result.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentValidation {
    /// Whether the shopper may proceed to a charge.
    pub approved: bool,
    /// Reason when not approved.
    pub message: Option<String>,
}

/// Credit-card charge payload.
///
/// Exactly one of the two field groups is populated: (`card_id`,
/// `expiration` from the stored card) when reusing a card on file, or
/// (`number`, `holder_name`, `expiration`, `cvv`) when charging freshly
/// entered fields. The two are never mixed; in particular the masked
/// placeholder expiry shown in the UI must never land here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardChargeRequest {
    /// Amount to charge.
    pub amount: Decimal,
    /// Stored card id, when reusing a card on file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
    /// Raw card number, when charging entered fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Printed holder name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    /// Expiry as `MM/YY`.
    pub expiration: String,
    /// Security code, when charging entered fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvv: Option<String>,
    /// Delivery address.
    pub address_id: Option<AddressId>,
}

/// Gateway response to a card charge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayReceipt {
    /// Whether the charge was approved.
    pub success: bool,
    /// Order id minted on success.
    pub order_id: Option<OrderId>,
    /// Gateway message (failure reason, surfaced verbatim).
    pub message: Option<String>,
}

/// PIX charge payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixChargeRequest {
    /// Discounted amount to collect.
    pub amount: Decimal,
    /// Delivery address.
    pub address_id: Option<AddressId>,
}

/// Gateway response to a PIX charge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixReceipt {
    /// Whether the PIX order was created.
    pub success: bool,
    /// Order id minted on success.
    pub order_id: Option<OrderId>,
    /// Copy-and-paste QR payload.
    pub qr_code: Option<String>,
    /// PIX key.
    pub key: Option<String>,
    /// Gateway message (failure reason, surfaced verbatim).
    pub message: Option<String>,
}

// =============================================================================
// PaymentClient
// =============================================================================

/// HTTP client for the payment backend.
#[derive(Clone)]
pub struct PaymentClient {
    inner: Arc<PaymentClientInner>,
}

struct PaymentClientInner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl PaymentClient {
    /// Create a new payment client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, api_key: SecretString) -> Self {
        Self {
            inner: Arc::new(PaymentClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            }),
        }
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        credential: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .inner
            .client
            .post(format!("{}{path}", self.inner.base_url))
            .header("X-Api-Key", self.inner.api_key.expose_secret())
            .bearer_auth(credential)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        parse_json(response).await
    }
}

impl PaymentApi for PaymentClient {
    #[instrument(skip(self, credential, request))]
    async fn validate(
        &self,
        credential: &str,
        request: &PaymentValidateRequest,
    ) -> Result<PaymentValidation, ApiError> {
        self.post("/payments/validate", credential, request).await
    }

    #[instrument(skip(self, credential, request), fields(amount = %request.amount))]
    async fn charge_card(
        &self,
        credential: &str,
        request: &CardChargeRequest,
    ) -> Result<GatewayReceipt, ApiError> {
        self.post("/payments/credit-card", credential, request)
            .await
    }

    #[instrument(skip(self, credential, request), fields(amount = %request.amount))]
    async fn charge_pix(
        &self,
        credential: &str,
        request: &PixChargeRequest,
    ) -> Result<PixReceipt, ApiError> {
        self.post("/payments/pix", credential, request).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_card_request_stored_card_omits_raw_fields() {
        let req = CardChargeRequest {
            amount: Decimal::new(9500, 2),
            card_id: Some(CardId::new(3)),
            number: None,
            holder_name: None,
            expiration: "11/27".to_string(),
            cvv: None,
            address_id: Some(AddressId::new(1)),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"cardId\":3"));
        assert!(!json.contains("number"));
        assert!(!json.contains("cvv"));
    }

    #[test]
    fn test_gateway_receipt_failure() {
        let json = r#"{"success":false,"message":"Issuer declined"}"#;
        let receipt: GatewayReceipt = serde_json::from_str(json).unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.order_id, None);
        assert_eq!(receipt.message.as_deref(), Some("Issuer declined"));
    }

    #[test]
    fn test_pix_receipt_success() {
        let json = r#"{"success":true,"orderId":88,"qrCode":"000201qr","key":"pix@varejo"}"#;
        let receipt: PixReceipt = serde_json::from_str(json).unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.order_id, Some(OrderId::new(88)));
    }
}
