//! Cart repositories.
//!
//! One capability contract, two backings: [`LocalCartRepository`] keeps a
//! guest's cart in a locally persisted blob, [`RemoteCartRepository`]
//! drives the cart backend. [`select_repository`] picks the variant from
//! the authentication state at cart-session start; the choice is never
//! re-evaluated in place - when auth state changes, the caller builds a
//! new session (and therefore re-selects).

use tracing::instrument;

use varejo_core::{ProductId, SkuId};

use crate::clients::{ApiError, CartApi};

use super::debounce::WriteDebouncer;
use super::model::{Cart, CartItem};
use super::store::{GuestCart, GuestCartItem, GuestCartStore, StoreError};

/// Errors from cart repository operations.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// The SKU could not be resolved to a cart line on the backend.
    #[error("item not found in cart: sku {0}")]
    ItemNotFound(SkuId),

    /// The backend line exists but carries no usable item id.
    #[error("cart item for sku {0} has no usable id")]
    InvalidItem(SkuId),

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Guest blob persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Capability contract for a cart backing.
///
/// `get` never fails for "no cart" - it returns the canonical empty shape
/// instead. `add_item` is deliberately not idempotent: each call adds one
/// unit.
pub trait CartRepository: Send + Sync {
    /// Current cart, or the empty shape when none exists.
    fn get(&self) -> impl Future<Output = Result<Cart, CartError>> + Send;

    /// Add one unit of a SKU, incrementing when already present.
    fn add_item(
        &self,
        sku_id: SkuId,
        product_id: Option<ProductId>,
    ) -> impl Future<Output = Result<Cart, CartError>> + Send;

    /// Set a line's quantity. Anything `<= 0` removes the line.
    fn set_item_quantity(
        &self,
        sku_id: SkuId,
        quantity: i32,
    ) -> impl Future<Output = Result<Cart, CartError>> + Send;

    /// Remove a line.
    fn remove_item(&self, sku_id: SkuId) -> impl Future<Output = Result<Cart, CartError>> + Send;

    /// Empty the cart.
    fn clear(&self) -> impl Future<Output = Result<Cart, CartError>> + Send;
}

// =============================================================================
// LocalCartRepository
// =============================================================================

/// Guest cart backed by a locally persisted blob.
///
/// Every operation is a read-modify-write on the blob; no network. A
/// nonzero write delay coalesces concurrent mutations into one save of
/// the newest value; reads go through the pending value meanwhile. Totals
/// are approximated as zero until pricing is available externally.
/// `set_item_quantity` on an absent SKU is a silent no-op here, unlike the
/// remote variant - intentional per-variant behavior.
pub struct LocalCartRepository<S> {
    store: S,
    debouncer: tokio::sync::Mutex<WriteDebouncer<GuestCart>>,
}

impl<S: GuestCartStore> LocalCartRepository<S> {
    /// Create a repository over a guest cart store.
    #[must_use]
    pub fn new(store: S, write_delay: std::time::Duration) -> Self {
        Self {
            store,
            debouncer: tokio::sync::Mutex::new(WriteDebouncer::new(write_delay)),
        }
    }

    async fn load(&self) -> Result<GuestCart, CartError> {
        // A write still sitting in the debouncer is newer than the store.
        {
            let debouncer = self.debouncer.lock().await;
            if let Some(pending) = debouncer.pending() {
                return Ok(pending.clone());
            }
        }
        Ok(self.store.load().await?.unwrap_or_default())
    }

    async fn persist(&self, blob: GuestCart) -> Result<Cart, CartError> {
        let cart = cart_from_blob(&blob);

        let deadline = {
            let mut debouncer = self.debouncer.lock().await;
            debouncer.schedule(blob);
            debouncer.deadline()
        };
        if let Some(deadline) = deadline {
            tokio::time::sleep_until(deadline).await;
        }

        // A mutation that landed while we slept replaced the pending value
        // and pushed its deadline; that call performs the one save for the
        // whole burst.
        let due = self.debouncer.lock().await.take_due();
        if let Some(due) = due {
            self.store.save(&due).await?;
        }
        Ok(cart)
    }
}

fn cart_from_blob(blob: &GuestCart) -> Cart {
    Cart {
        id: blob.id.clone(),
        items: blob
            .items
            .iter()
            .map(|item| CartItem::new(item.sku_id, item.product_id, item.quantity))
            .collect(),
        subtotal: rust_decimal::Decimal::ZERO,
        total: rust_decimal::Decimal::ZERO,
    }
}

impl<S: GuestCartStore> CartRepository for LocalCartRepository<S> {
    async fn get(&self) -> Result<Cart, CartError> {
        let blob = self.load().await?;
        Ok(cart_from_blob(&blob))
    }

    #[instrument(skip(self), fields(sku_id = %sku_id))]
    async fn add_item(&self, sku_id: SkuId, product_id: Option<ProductId>) -> Result<Cart, CartError> {
        let mut blob = self.load().await?;
        match blob.items.iter_mut().find(|item| item.sku_id == sku_id) {
            Some(item) => item.quantity += 1,
            None => blob.items.push(GuestCartItem {
                sku_id,
                product_id,
                quantity: 1,
            }),
        }
        self.persist(blob).await
    }

    #[instrument(skip(self), fields(sku_id = %sku_id, quantity))]
    async fn set_item_quantity(&self, sku_id: SkuId, quantity: i32) -> Result<Cart, CartError> {
        let mut blob = self.load().await?;

        if quantity <= 0 {
            blob.items.retain(|item| item.sku_id != sku_id);
            return self.persist(blob).await;
        }

        // Absent SKU: no-op, return the cart unchanged. The remote variant
        // errors instead; both behaviors are specified per-variant.
        if let Some(item) = blob.items.iter_mut().find(|item| item.sku_id == sku_id) {
            #[allow(clippy::cast_sign_loss)]
            {
                item.quantity = quantity as u32;
            }
        }
        self.persist(blob).await
    }

    #[instrument(skip(self), fields(sku_id = %sku_id))]
    async fn remove_item(&self, sku_id: SkuId) -> Result<Cart, CartError> {
        let mut blob = self.load().await?;
        blob.items.retain(|item| item.sku_id != sku_id);
        self.persist(blob).await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<Cart, CartError> {
        self.debouncer.lock().await.cancel();
        self.store.clear().await?;
        Ok(Cart::empty())
    }
}

// =============================================================================
// RemoteCartRepository
// =============================================================================

/// Cart backed by the remote cart service.
///
/// The backend keys lines by its own item id, not by SKU, so mutations
/// addressed by SKU follow a fetch-resolve-mutate-refetch protocol:
/// quantity updates and removals are three round trips (fetch-basic to
/// resolve the id, mutate, fetch-enriched).
pub struct RemoteCartRepository<C> {
    api: C,
}

impl<C: CartApi> RemoteCartRepository<C> {
    /// Create a repository over a cart backend client.
    #[must_use]
    pub const fn new(api: C) -> Self {
        Self { api }
    }

    /// Resolve a SKU to the backend's line-item id.
    async fn resolve_item(&self, sku_id: SkuId) -> Result<varejo_core::ItemId, CartError> {
        let basic = self.api.fetch_basic().await?;
        let line = basic
            .items
            .iter()
            .find(|item| item.sku_id == sku_id)
            .ok_or(CartError::ItemNotFound(sku_id))?;
        line.id.ok_or(CartError::InvalidItem(sku_id))
    }

    /// Re-fetch the enriched cart after a mutation.
    async fn refreshed(&self) -> Result<Cart, CartError> {
        match self.api.fetch_full().await {
            Ok(remote) => Ok(Cart {
                id: remote.id,
                items: remote
                    .items
                    .into_iter()
                    .map(|item| CartItem::new(item.sku_id, item.product_id, item.quantity))
                    .collect(),
                subtotal: remote.subtotal,
                total: remote.total,
            }),
            Err(ApiError::NotFound(_)) => Ok(Cart::empty()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<C: CartApi> CartRepository for RemoteCartRepository<C> {
    async fn get(&self) -> Result<Cart, CartError> {
        self.refreshed().await
    }

    #[instrument(skip(self), fields(sku_id = %sku_id))]
    async fn add_item(&self, sku_id: SkuId, product_id: Option<ProductId>) -> Result<Cart, CartError> {
        self.api.add_item(sku_id, product_id, 1).await?;
        self.refreshed().await
    }

    #[instrument(skip(self), fields(sku_id = %sku_id, quantity))]
    async fn set_item_quantity(&self, sku_id: SkuId, quantity: i32) -> Result<Cart, CartError> {
        let item_id = self.resolve_item(sku_id).await?;
        if quantity <= 0 {
            self.api.remove_item(item_id, sku_id).await?;
        } else {
            #[allow(clippy::cast_sign_loss)]
            self.api
                .update_quantity(item_id, sku_id, quantity as u32)
                .await?;
        }
        self.refreshed().await
    }

    #[instrument(skip(self), fields(sku_id = %sku_id))]
    async fn remove_item(&self, sku_id: SkuId) -> Result<Cart, CartError> {
        let item_id = self.resolve_item(sku_id).await?;
        self.api.remove_item(item_id, sku_id).await?;
        self.refreshed().await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<Cart, CartError> {
        self.api.clear().await?;
        Ok(Cart::empty())
    }
}

// =============================================================================
// Repository Selector
// =============================================================================

/// The repository variant picked at cart-session start.
pub enum SelectedRepository<S, C> {
    /// Guest: locally persisted blob.
    Local(LocalCartRepository<S>),
    /// Authenticated: server-backed cart.
    Remote(RemoteCartRepository<C>),
}

/// Pick a cart backing from the authentication state at this instant.
///
/// Not reactive: a credential appearing or expiring mid-session only takes
/// effect once the cart session is rebuilt and this factory runs again.
pub fn select_repository<S: GuestCartStore, C: CartApi>(
    authenticated: bool,
    store: S,
    api: C,
    write_delay: std::time::Duration,
) -> SelectedRepository<S, C> {
    if authenticated {
        SelectedRepository::Remote(RemoteCartRepository::new(api))
    } else {
        SelectedRepository::Local(LocalCartRepository::new(store, write_delay))
    }
}

impl<S: GuestCartStore, C: CartApi> CartRepository for SelectedRepository<S, C> {
    async fn get(&self) -> Result<Cart, CartError> {
        match self {
            Self::Local(repo) => repo.get().await,
            Self::Remote(repo) => repo.get().await,
        }
    }

    async fn add_item(&self, sku_id: SkuId, product_id: Option<ProductId>) -> Result<Cart, CartError> {
        match self {
            Self::Local(repo) => repo.add_item(sku_id, product_id).await,
            Self::Remote(repo) => repo.add_item(sku_id, product_id).await,
        }
    }

    async fn set_item_quantity(&self, sku_id: SkuId, quantity: i32) -> Result<Cart, CartError> {
        match self {
            Self::Local(repo) => repo.set_item_quantity(sku_id, quantity).await,
            Self::Remote(repo) => repo.set_item_quantity(sku_id, quantity).await,
        }
    }

    async fn remove_item(&self, sku_id: SkuId) -> Result<Cart, CartError> {
        match self {
            Self::Local(repo) => repo.remove_item(sku_id).await,
            Self::Remote(repo) => repo.remove_item(sku_id).await,
        }
    }

    async fn clear(&self) -> Result<Cart, CartError> {
        match self {
            Self::Local(repo) => repo.clear().await,
            Self::Remote(repo) => repo.clear().await,
        }
    }
}
