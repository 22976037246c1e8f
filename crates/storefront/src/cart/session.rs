//! Cart session facade.
//!
//! The single entry point the request handlers consume. Wraps a selected
//! repository, re-runs catalog enrichment after every operation, and
//! tracks loading/error state. Operations are deliberately not queued:
//! concurrent calls race and the last result to land wins.

use std::sync::Mutex;

use tracing::warn;

use varejo_core::{ProductId, SkuId};

use crate::clients::CatalogApi;

use super::enrichment::enrich_cart;
use super::model::Cart;
use super::repository::{CartError, CartRepository};

/// Observable facade state.
#[derive(Debug, Clone)]
pub struct CartState {
    /// The last successfully loaded cart.
    pub cart: Cart,
    /// Whether an operation is in flight.
    pub loading: bool,
    /// Human-readable message from the last failed operation.
    pub error: Option<String>,
}

/// Facade over a cart repository plus the enrichment pass.
pub struct CartSession<R, K> {
    repository: R,
    catalog: K,
    state: Mutex<CartState>,
}

impl<R: CartRepository, K: CatalogApi> CartSession<R, K> {
    /// Build a facade over an already-selected repository.
    pub fn new(repository: R, catalog: K) -> Self {
        Self {
            repository,
            catalog,
            state: Mutex::new(CartState {
                cart: Cart::empty(),
                loading: false,
                error: None,
            }),
        }
    }

    /// Snapshot of the observable state.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[must_use]
    pub fn state(&self) -> CartState {
        #[allow(clippy::unwrap_used)]
        self.state.lock().unwrap().clone()
    }

    /// Load the current cart.
    pub async fn fetch_cart(&self) -> Result<Cart, CartError> {
        self.run(self.repository.get()).await
    }

    /// Add one unit of a SKU.
    pub async fn add_item(
        &self,
        sku_id: SkuId,
        product_id: Option<ProductId>,
    ) -> Result<Cart, CartError> {
        self.run(self.repository.add_item(sku_id, product_id)).await
    }

    /// Change a line's quantity. Anything `<= 0` removes it.
    pub async fn change_item_quantity(
        &self,
        sku_id: SkuId,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        self.run(self.repository.set_item_quantity(sku_id, quantity))
            .await
    }

    /// Remove a line.
    pub async fn remove_item(&self, sku_id: SkuId) -> Result<Cart, CartError> {
        self.run(self.repository.remove_item(sku_id)).await
    }

    /// Empty the cart.
    pub async fn clear_items(&self) -> Result<Cart, CartError> {
        self.run(self.repository.clear()).await
    }

    /// Run one repository operation through the shared load/enrich/store
    /// cycle. On failure the previous cart is left untouched and only the
    /// error message changes.
    async fn run(
        &self,
        op: impl Future<Output = Result<Cart, CartError>>,
    ) -> Result<Cart, CartError> {
        self.with_state(|state| {
            state.loading = true;
            state.error = None;
        });

        match op.await {
            Ok(mut cart) => {
                enrich_cart(&self.catalog, &mut cart).await;
                self.with_state(|state| {
                    state.cart = cart.clone();
                    state.loading = false;
                });
                Ok(cart)
            }
            Err(e) => {
                warn!(error = %e, "cart operation failed");
                self.with_state(|state| {
                    state.loading = false;
                    state.error = Some(user_message(&e));
                });
                Err(e)
            }
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut CartState)) {
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        f(&mut state);
    }
}

/// Message shown to the shopper for a failed cart operation.
fn user_message(error: &CartError) -> String {
    match error {
        CartError::ItemNotFound(_) => "This item is no longer in your cart.".to_string(),
        CartError::InvalidItem(_) => "This item cannot be changed right now.".to_string(),
        CartError::Api(_) => "We could not update your cart. Please try again.".to_string(),
        CartError::Store(_) => "We could not save your cart. Please try again.".to_string(),
    }
}
