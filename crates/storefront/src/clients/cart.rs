//! Cart backend client.
//!
//! The cart backend exposes two read endpoints: `GET /cart/items` returns
//! the *basic* cart (line ids, SKU ids, quantities - nothing else), and
//! `GET /cart` returns the *enriched* cart with catalog data and
//! authoritative totals. Mutations are keyed by SKU on the wire but the
//! backend's own line identity is the item id, so quantity updates and
//! removals must resolve it first (see `cart::repository`).

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use varejo_core::{CartId, ItemId, ProductId, SkuId};

use super::{ApiError, error_from_response, parse_json};

/// Capability contract for the cart backend.
///
/// Implemented by [`CartClient`] for HTTP, and by in-memory fakes in tests.
pub trait CartApi: Send + Sync {
    /// Fetch the basic cart (line ids + SKU ids + quantities).
    fn fetch_basic(&self) -> impl Future<Output = Result<BasicCart, ApiError>> + Send;

    /// Fetch the enriched cart with catalog data and totals.
    fn fetch_full(&self) -> impl Future<Output = Result<RemoteCart, ApiError>> + Send;

    /// Add a SKU to the cart. The backend increments quantity when the SKU
    /// is already present.
    fn add_item(
        &self,
        sku_id: SkuId,
        product_id: Option<ProductId>,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Update the quantity of an existing line.
    fn update_quantity(
        &self,
        item_id: ItemId,
        sku_id: SkuId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove a line.
    fn remove_item(
        &self,
        item_id: ItemId,
        sku_id: SkuId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Empty the cart.
    fn clear(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}

// =============================================================================
// Wire Types
// =============================================================================

/// Basic cart: the minimal shape needed to resolve SKU -> item id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicCart {
    /// Backend cart id.
    pub id: CartId,
    /// Lines with backend identity.
    #[serde(default)]
    pub items: Vec<BasicCartItem>,
}

/// A line in the basic cart.
///
/// `id` is optional on the wire: the backend has been observed returning
/// lines mid-write with no id yet, and a mutation must not target those.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicCartItem {
    /// Backend line-item id, when assigned.
    pub id: Option<ItemId>,
    /// Catalog SKU id.
    pub sku_id: SkuId,
    /// Quantity.
    pub quantity: u32,
}

/// Enriched cart returned by `GET /cart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCart {
    /// Backend cart id.
    pub id: CartId,
    /// Lines.
    #[serde(default)]
    pub items: Vec<RemoteCartItem>,
    /// Authoritative subtotal.
    #[serde(default)]
    pub subtotal: Decimal,
    /// Authoritative total.
    #[serde(default)]
    pub total: Decimal,
}

/// A line in the enriched cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCartItem {
    /// Backend line-item id.
    pub id: Option<ItemId>,
    /// Catalog SKU id.
    pub sku_id: SkuId,
    /// Parent product id.
    pub product_id: Option<ProductId>,
    /// Quantity.
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItemBody {
    sku_id: SkuId,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_id: Option<ProductId>,
    quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateQuantityBody {
    item_id: ItemId,
    sku_id: SkuId,
    quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveItemBody {
    item_id: ItemId,
    sku_id: SkuId,
}

// =============================================================================
// CartClient
// =============================================================================

/// HTTP client for the cart backend, scoped to one shopper credential.
///
/// Cheap to construct per request: the HTTP connection pool and base URL
/// are shared behind an `Arc`.
#[derive(Clone)]
pub struct CartClient {
    inner: Arc<CartClientInner>,
    credential: String,
}

struct CartClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl CartClient {
    /// Create a new cart client for the given credential.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, credential: &str) -> Self {
        Self {
            inner: Arc::new(CartClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
            credential: credential.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request
            .bearer_auth(&self.credential)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

impl CartApi for CartClient {
    #[instrument(skip(self))]
    async fn fetch_basic(&self) -> Result<BasicCart, ApiError> {
        let response = self
            .send(self.inner.client.get(self.url("/cart/items")))
            .await?;
        parse_json(response).await
    }

    #[instrument(skip(self))]
    async fn fetch_full(&self) -> Result<RemoteCart, ApiError> {
        let response = self.send(self.inner.client.get(self.url("/cart"))).await?;
        parse_json(response).await
    }

    #[instrument(skip(self), fields(sku_id = %sku_id))]
    async fn add_item(
        &self,
        sku_id: SkuId,
        product_id: Option<ProductId>,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let body = AddItemBody {
            sku_id,
            product_id,
            quantity,
        };
        self.send(self.inner.client.post(self.url("/cart/items")).json(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %item_id, sku_id = %sku_id))]
    async fn update_quantity(
        &self,
        item_id: ItemId,
        sku_id: SkuId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let body = UpdateQuantityBody {
            item_id,
            sku_id,
            quantity,
        };
        self.send(
            self.inner
                .client
                .patch(self.url("/cart/items/qty"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %item_id, sku_id = %sku_id))]
    async fn remove_item(&self, item_id: ItemId, sku_id: SkuId) -> Result<(), ApiError> {
        let body = RemoveItemBody { item_id, sku_id };
        self.send(
            self.inner
                .client
                .delete(self.url("/cart/items"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), ApiError> {
        self.send(self.inner.client.delete(self.url("/cart")))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cart_deserialize() {
        let json = r#"{"id":"c-1","items":[{"id":10,"skuId":42,"quantity":2},{"skuId":7,"quantity":1}]}"#;
        let cart: BasicCart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].id, Some(ItemId::new(10)));
        assert_eq!(cart.items[1].id, None);
        assert_eq!(cart.items[1].sku_id, SkuId::new(7));
    }

    #[test]
    fn test_remote_cart_defaults() {
        // A brand new cart may come back with no items and no totals.
        let json = r#"{"id":"c-1"}"#;
        let cart: RemoteCart = serde_json::from_str(json).unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }

    #[test]
    fn test_update_body_shape() {
        let body = UpdateQuantityBody {
            item_id: ItemId::new(10),
            sku_id: SkuId::new(42),
            quantity: 3,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"itemId":10,"skuId":42,"quantity":3}"#);
    }
}
