//! Application state shared across handlers.

use std::sync::Arc;

use crate::checkout::CheckoutRegistry;
use crate::clients::{CartClient, CatalogClient, IdentityClient, PaymentClient, PostalClient};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the backend clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    http: reqwest::Client,
    catalog: CatalogClient,
    identity: IdentityClient,
    payment: PaymentClient,
    postal: PostalClient,
    checkouts: CheckoutRegistry,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let http = reqwest::Client::new();
        let catalog = CatalogClient::new(http.clone(), &config.backends.catalog_url);
        let identity = IdentityClient::new(http.clone(), &config.backends.identity_url);
        let payment = PaymentClient::new(
            http.clone(),
            &config.backends.payment_url,
            config.backends.payment_api_key.clone(),
        );
        let postal = PostalClient::new(http.clone(), &config.backends.postal_lookup_url);
        let checkouts = CheckoutRegistry::new(config.checkout.checkout_idle);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                http,
                catalog,
                identity,
                payment,
                postal,
                checkouts,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Build a cart backend client for one shopper's credential. Cheap:
    /// shares the underlying HTTP client.
    #[must_use]
    pub fn cart_client(&self, credential: &str) -> CartClient {
        CartClient::new(
            self.inner.http.clone(),
            &self.inner.config.backends.cart_url,
            credential,
        )
    }

    /// Get a reference to the catalog client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the identity client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// Get a reference to the payment client.
    #[must_use]
    pub fn payment(&self) -> &PaymentClient {
        &self.inner.payment
    }

    /// Get a reference to the postal-lookup client.
    #[must_use]
    pub fn postal(&self) -> &PostalClient {
        &self.inner.postal
    }

    /// Get a reference to the live checkout registry.
    #[must_use]
    pub fn checkouts(&self) -> &CheckoutRegistry {
        &self.inner.checkouts
    }
}
