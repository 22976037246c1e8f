//! Guest cart persistence.
//!
//! The guest cart is a small JSON blob saved under a well-known session
//! key - the server-side analog of a browser's local storage entry. The
//! [`GuestCartStore`] trait keeps the local repository testable without a
//! live session layer.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use varejo_core::{CartId, ProductId, SkuId};

use crate::models::session_keys;

/// The persisted guest-cart blob: ids and quantities only. Enrichment
/// data is never written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCart {
    /// Locally generated cart id.
    pub id: CartId,
    /// Lines, in insertion order.
    pub items: Vec<GuestCartItem>,
}

impl GuestCart {
    /// A fresh guest cart with a random id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: CartId::new(format!("guest-{}", uuid::Uuid::new_v4())),
            items: Vec::new(),
        }
    }
}

impl Default for GuestCart {
    fn default() -> Self {
        Self::new()
    }
}

/// A persisted guest line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCartItem {
    /// SKU id.
    pub sku_id: SkuId,
    /// Parent product id, when known.
    pub product_id: Option<ProductId>,
    /// Quantity, always > 0.
    pub quantity: u32,
}

/// Error persisting or loading the guest cart blob.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The session layer failed.
    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Persistence seam for the guest cart blob.
pub trait GuestCartStore: Send + Sync {
    /// Load the blob, `None` when no cart was saved yet.
    fn load(&self) -> impl Future<Output = Result<Option<GuestCart>, StoreError>> + Send;

    /// Save (overwrite) the blob.
    fn save(&self, cart: &GuestCart) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the blob entirely.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: GuestCartStore> GuestCartStore for &S {
    fn load(&self) -> impl Future<Output = Result<Option<GuestCart>, StoreError>> + Send {
        (**self).load()
    }

    fn save(&self, cart: &GuestCart) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).save(cart)
    }

    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).clear()
    }
}

/// Session-backed guest cart store.
#[derive(Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    /// Wrap a request's session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl GuestCartStore for SessionCartStore {
    async fn load(&self) -> Result<Option<GuestCart>, StoreError> {
        Ok(self.session.get(session_keys::GUEST_CART).await?)
    }

    async fn save(&self, cart: &GuestCart) -> Result<(), StoreError> {
        self.session.insert(session_keys::GUEST_CART, cart).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.session
            .remove::<GuestCart>(session_keys::GUEST_CART)
            .await?;
        Ok(())
    }
}

/// In-memory store for tests. Counts saves so debounce behavior is
/// observable.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCartStore {
    blob: std::sync::Mutex<Option<GuestCart>>,
    saves: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MemoryCartStore {
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl GuestCartStore for MemoryCartStore {
    async fn load(&self) -> Result<Option<GuestCart>, StoreError> {
        #[allow(clippy::unwrap_used)]
        Ok(self.blob.lock().unwrap().clone())
    }

    async fn save(&self, cart: &GuestCart) -> Result<(), StoreError> {
        self.saves
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        #[allow(clippy::unwrap_used)]
        let mut guard = self.blob.lock().unwrap();
        *guard = Some(cart.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        #[allow(clippy::unwrap_used)]
        let mut guard = self.blob.lock().unwrap();
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_cart_blob_roundtrip() {
        let mut cart = GuestCart::new();
        cart.items.push(GuestCartItem {
            sku_id: SkuId::new(42),
            product_id: Some(ProductId::new(7)),
            quantity: 2,
        });
        cart.items.push(GuestCartItem {
            sku_id: SkuId::new(9),
            product_id: None,
            quantity: 1,
        });

        // Persisting and reloading yields an equal structure: same items,
        // same quantities, same order.
        let json = serde_json::to_string(&cart).unwrap();
        let reloaded: GuestCart = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, cart);
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCartStore::default();
        assert!(store.load().await.unwrap().is_none());

        let cart = GuestCart::new();
        store.save(&cart).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(cart));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
