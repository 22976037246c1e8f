//! Shopping cart subsystem.
//!
//! A guest's cart lives in a session blob; an authenticated shopper's
//! cart lives on the cart backend. Both sit behind the same
//! [`CartRepository`] contract, selected once per request from the auth
//! state, and every result is decorated with catalog data before it
//! reaches a handler.

pub mod debounce;
pub mod enrichment;
pub mod model;
pub mod repository;
pub mod session;
pub mod store;

pub use model::{Cart, CartItem, EnrichedSku};
pub use repository::{CartError, CartRepository, SelectedRepository, select_repository};
pub use session::{CartSession, CartState};
pub use store::{GuestCartStore, SessionCartStore};
