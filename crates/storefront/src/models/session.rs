//! Session-related types.
//!
//! Types stored in the session for authentication and cart state.

use serde::{Deserialize, Serialize};

use crate::clients::AuthCredential;

/// Session-stored shopper identity.
///
/// Minimal data kept in the session to identify a signed-in shopper; the
/// backend profile is the source of truth for everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentShopper {
    /// Shopper's email address.
    pub email: String,
    /// The backend credential, with its multi-day expiry.
    pub credential: AuthCredential,
}

impl CurrentShopper {
    /// Whether the stored credential is still usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.credential.is_valid()
    }
}

/// Session keys for authentication and cart data.
pub mod keys {
    /// Key for storing the current signed-in shopper.
    pub const CURRENT_SHOPPER: &str = "current_shopper";

    /// Key for the guest cart blob.
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for the live checkout session id.
    pub const CHECKOUT: &str = "checkout_session";
}
