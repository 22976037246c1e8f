//! Cart route handlers.
//!
//! Every handler builds a cart session for this request: the repository
//! is selected from the auth state the moment the request arrives, so a
//! shopper signing in mid-browse gets the server-backed cart on their
//! next request without any in-place switching.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use varejo_core::{ProductId, SkuId};

use crate::cart::{Cart, CartSession, SelectedRepository, SessionCartStore, select_repository};
use crate::clients::{CartClient, CatalogClient};
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::CurrentShopper;
use crate::state::AppState;

/// The cart session shape every handler works with.
type ShopperCartSession = CartSession<SelectedRepository<SessionCartStore, CartClient>, CatalogClient>;

/// Build the cart session for this request from the current auth state.
pub(super) fn cart_session(
    state: &AppState,
    session: Session,
    shopper: Option<&CurrentShopper>,
) -> ShopperCartSession {
    let credential = shopper.map_or("", |s| s.credential.token.as_str());
    let repository = select_repository(
        shopper.is_some(),
        SessionCartStore::new(session),
        state.cart_client(credential),
        state.config().checkout.guest_cart_write_delay,
    );
    CartSession::new(repository, state.catalog().clone())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemBody {
    pub sku_id: SkuId,
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityBody {
    pub sku_id: SkuId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemBody {
    pub sku_id: SkuId,
}

#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

/// GET /cart - the current enriched cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(shopper): OptionalAuth,
    session: Session,
) -> Result<Json<Cart>> {
    let cart = cart_session(&state, session, shopper.as_ref())
        .fetch_cart()
        .await?;
    Ok(Json(cart))
}

/// POST /cart/items - add one unit of a SKU.
#[instrument(skip_all, fields(sku_id = %body.sku_id))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(shopper): OptionalAuth,
    session: Session,
    Json(body): Json<AddItemBody>,
) -> Result<impl IntoResponse> {
    let cart = cart_session(&state, session, shopper.as_ref())
        .add_item(body.sku_id, body.product_id)
        .await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// PATCH /cart/items - set a line's quantity (<= 0 removes it).
#[instrument(skip_all, fields(sku_id = %body.sku_id, quantity = body.quantity))]
pub async fn update_quantity(
    State(state): State<AppState>,
    OptionalAuth(shopper): OptionalAuth,
    session: Session,
    Json(body): Json<UpdateQuantityBody>,
) -> Result<Json<Cart>> {
    let cart = cart_session(&state, session, shopper.as_ref())
        .change_item_quantity(body.sku_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart/items - remove a line.
#[instrument(skip_all, fields(sku_id = %body.sku_id))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(shopper): OptionalAuth,
    session: Session,
    Json(body): Json<RemoveItemBody>,
) -> Result<Json<Cart>> {
    let cart = cart_session(&state, session, shopper.as_ref())
        .remove_item(body.sku_id)
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart - empty the cart.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    OptionalAuth(shopper): OptionalAuth,
    session: Session,
) -> Result<Json<Cart>> {
    let cart = cart_session(&state, session, shopper.as_ref())
        .clear_items()
        .await?;
    Ok(Json(cart))
}

/// GET /cart/count - unit count for the header badge.
#[instrument(skip_all)]
pub async fn count(
    State(state): State<AppState>,
    OptionalAuth(shopper): OptionalAuth,
    session: Session,
) -> Result<Json<CartCount>> {
    let cart = cart_session(&state, session, shopper.as_ref())
        .fetch_cart()
        .await?;
    Ok(Json(CartCount {
        count: cart.item_count(),
    }))
}
