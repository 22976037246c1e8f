//! Domain models for storefront.

pub mod session;

pub use session::{CurrentShopper, keys as session_keys};
