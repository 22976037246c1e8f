//! Catalog backend client.
//!
//! Used exclusively by the cart enrichment pipeline: one batched lookup
//! per cart, keyed by SKU id. The endpoint has been observed returning
//! either a bare array or an object wrapping the array, so the response
//! shape is tolerant of both.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use varejo_core::{ProductId, SkuId};

use super::{ApiError, error_from_response, parse_json};

/// Capability contract for the catalog backend.
pub trait CatalogApi: Send + Sync {
    /// Batched SKU lookup. Returns whatever subset of `sku_ids` the
    /// catalog knows about; missing ids are simply absent from the result.
    fn lookup_skus(
        &self,
        sku_ids: &[SkuId],
    ) -> impl Future<Output = Result<Vec<SkuDetails>, ApiError>> + Send;
}

/// Catalog data for one SKU, as attached to cart items by enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuDetails {
    /// SKU id.
    pub id: SkuId,
    /// Parent product id.
    pub product_id: Option<ProductId>,
    /// Display title.
    pub title: String,
    /// Brand name.
    pub brand: Option<String>,
    /// Primary image URL.
    pub image_url: Option<String>,
    /// Current selling price.
    pub price: Decimal,
    /// Pre-discount list price.
    pub list_price: Option<Decimal>,
}

/// The batched lookup endpoint returns either a bare array or a wrapped
/// object depending on backend version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkuLookupResponse {
    Bare(Vec<SkuDetails>),
    Wrapped { items: Vec<SkuDetails> },
}

impl SkuLookupResponse {
    fn into_items(self) -> Vec<SkuDetails> {
        match self {
            Self::Bare(items) | Self::Wrapped { items } => items,
        }
    }
}

/// HTTP client for the catalog backend.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    /// Create a new catalog client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            inner: Arc::new(CatalogClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
        }
    }
}

impl CatalogApi for CatalogClient {
    #[instrument(skip(self), fields(sku_count = sku_ids.len()))]
    async fn lookup_skus(&self, sku_ids: &[SkuId]) -> Result<Vec<SkuDetails>, ApiError> {
        if sku_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = sku_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .inner
            .client
            .get(format!("{}/skus", self.inner.base_url))
            .query(&[("ids", ids)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: SkuLookupResponse = parse_json(response).await?;
        Ok(parsed.into_items())
    }
}
