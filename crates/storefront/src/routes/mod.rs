//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Health check
//!
//! # Cart
//! GET    /cart                      - Current enriched cart
//! DELETE /cart                      - Empty the cart
//! POST   /cart/items                - Add one unit of a SKU
//! PATCH  /cart/items                - Set a line's quantity (<= 0 removes)
//! DELETE /cart/items                - Remove a line
//! GET    /cart/count                - Unit count badge
//!
//! # Checkout
//! POST   /checkout/start            - Begin (or restart) the wizard
//! GET    /checkout                  - Current wizard state
//! PATCH  /checkout/form             - Apply a form patch
//! POST   /checkout/step             - Move between wizard steps
//! POST   /checkout/validate-field   - Blur-time validation of one field
//! GET    /checkout/postal/{cep}     - Postal lookup + shipping autofill
//! POST   /checkout/submit           - Provision (guests) and charge
//!
//! # Auth
//! POST   /auth/sign-in              - Sign in
//! POST   /auth/sign-out             - Sign out
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route(
            "/items",
            post(cart::add)
                .patch(cart::update_quantity)
                .delete(cart::remove),
        )
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/start", post(checkout::start))
        .route("/form", patch(checkout::patch_form))
        .route("/step", post(checkout::go_to_step))
        .route("/validate-field", post(checkout::blur_validate))
        .route("/postal/{cep}", get(checkout::postal_autofill))
        .route("/submit", post(checkout::submit))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-in", post(auth::sign_in))
        .route("/sign-out", post(auth::sign_out))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
}

async fn health() -> &'static str {
    "ok"
}
