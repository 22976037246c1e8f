//! Catalog enrichment of bare cart lines.
//!
//! Repositories hand back carts with ids and quantities only; this pass
//! decorates each line with its catalog details via one batched lookup.
//! Enrichment never fails a cart operation: lookup errors are logged and
//! the cart goes out undecorated.

use std::collections::HashMap;

use tracing::{debug, warn};

use varejo_core::SkuId;

use crate::clients::CatalogApi;

use super::model::Cart;

/// Decorate every line of `cart` with catalog data, in place.
///
/// Collects the distinct SKU set (an empty cart short-circuits), issues a
/// single batched lookup, and attaches details per line. SKUs the catalog
/// does not know stay bare. Running the pass again over an
/// already-enriched cart yields the same result.
pub async fn enrich_cart<K: CatalogApi>(catalog: &K, cart: &mut Cart) {
    let mut ids: Vec<SkuId> = cart.items.iter().map(|item| item.sku_id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return;
    }

    let details = match catalog.lookup_skus(&ids).await {
        Ok(details) => details,
        Err(e) => {
            warn!(error = %e, sku_count = ids.len(), "catalog lookup failed, cart left unenriched");
            return;
        }
    };

    let by_id: HashMap<SkuId, _> = details.into_iter().map(|sku| (sku.id, sku)).collect();
    let mut missing = 0usize;
    for item in &mut cart.items {
        match by_id.get(&item.sku_id) {
            Some(sku) => item.sku = Some(sku.clone()),
            None => missing += 1,
        }
    }
    if missing > 0 {
        debug!(missing, "catalog lookup returned no details for some cart SKUs");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::model::CartItem;
    use crate::clients::{ApiError, SkuDetails};
    use varejo_core::{CartId, ProductId};

    struct FakeCatalog {
        skus: Vec<SkuDetails>,
        fail: bool,
        requests: Mutex<Vec<Vec<SkuId>>>,
    }

    impl FakeCatalog {
        fn with(skus: Vec<SkuDetails>) -> Self {
            Self {
                skus,
                fail: false,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                skus: Vec::new(),
                fail: true,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl CatalogApi for FakeCatalog {
        async fn lookup_skus(&self, ids: &[SkuId]) -> Result<Vec<SkuDetails>, ApiError> {
            self.requests.lock().unwrap().push(ids.to_vec());
            if self.fail {
                return Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(self
                .skus
                .iter()
                .filter(|sku| ids.contains(&sku.id))
                .cloned()
                .collect())
        }
    }

    fn details(id: i64) -> SkuDetails {
        SkuDetails {
            id: SkuId::new(id),
            product_id: Some(ProductId::new(id * 10)),
            title: format!("Produto {id}"),
            brand: None,
            image_url: None,
            price: Decimal::new(9990, 2),
            list_price: None,
        }
    }

    fn cart_with(skus: &[i64]) -> Cart {
        Cart {
            id: CartId::new("c1"),
            items: skus
                .iter()
                .map(|&id| CartItem::new(SkuId::new(id), None, 1))
                .collect(),
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn test_empty_cart_short_circuits() {
        let catalog = FakeCatalog::with(vec![details(1)]);
        let mut cart = cart_with(&[]);
        enrich_cart(&catalog, &mut cart).await;
        assert!(catalog.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_batched_lookup_over_distinct_skus() {
        let catalog = FakeCatalog::with(vec![details(1), details(2)]);
        let mut cart = cart_with(&[2, 1]);
        enrich_cart(&catalog, &mut cart).await;

        let requests = catalog.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], vec![SkuId::new(1), SkuId::new(2)]);
        drop(requests);

        assert!(cart.items.iter().all(|item| item.sku.is_some()));
        assert_eq!(cart.items[0].sku.as_ref().unwrap().title, "Produto 2");
    }

    #[tokio::test]
    async fn test_unknown_sku_left_bare_without_error() {
        let catalog = FakeCatalog::with(vec![details(1)]);
        let mut cart = cart_with(&[1, 99]);
        enrich_cart(&catalog, &mut cart).await;

        assert!(cart.find_item(SkuId::new(1)).unwrap().sku.is_some());
        assert!(cart.find_item(SkuId::new(99)).unwrap().sku.is_none());
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_unenriched() {
        let catalog = FakeCatalog::failing();
        let mut cart = cart_with(&[1]);
        enrich_cart(&catalog, &mut cart).await;
        assert!(cart.items[0].sku.is_none());
    }

    #[tokio::test]
    async fn test_enrichment_is_idempotent() {
        let catalog = FakeCatalog::with(vec![details(1)]);
        let mut cart = cart_with(&[1]);
        enrich_cart(&catalog, &mut cart).await;
        let first = cart.clone();
        enrich_cart(&catalog, &mut cart).await;
        assert_eq!(cart.items[0].sku, first.items[0].sku);
    }
}
