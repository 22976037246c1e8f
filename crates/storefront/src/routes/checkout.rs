//! Checkout route handlers.
//!
//! The wizard state lives in the in-memory checkout registry; the
//! shopper's session only carries the registry key. Submitting payment
//! runs provisioning (for guests) and the payment dispatcher, and on
//! success clears the cart and discards the wizard state.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{instrument, warn};

use varejo_core::OrderId;

use crate::cart::Cart;
use crate::checkout::{
    CheckoutFormData, CheckoutFormPatch, CheckoutSession, CheckoutStep, FormErrors,
    MaskedCardState, PaymentRequest, dispatch_payment, provision_guest, resolve_account, validate,
};
use crate::clients::{IdentityApi, PostalAddress, PostalLookupApi, ProfileDetails};
use crate::error::{AppError, Result, set_sentry_user};
use crate::middleware::{OptionalAuth, set_current_shopper};
use crate::models::{CurrentShopper, session_keys};
use crate::state::AppState;

use super::cart::cart_session;

/// What the wizard UI renders.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub step: CheckoutStep,
    pub form: CheckoutFormData,
    pub errors: FormErrors,
    pub masked_card: Option<MaskedCardState>,
    pub authenticated: bool,
}

impl CheckoutView {
    fn of(session: &CheckoutSession) -> Self {
        Self {
            step: session.step,
            form: session.form.clone(),
            errors: session.errors.clone(),
            masked_card: session.masked_card.clone(),
            authenticated: session.authenticated,
        }
    }
}

/// POST /checkout/start - begin (or restart) the wizard.
#[instrument(skip_all, fields(authenticated = shopper.is_some()))]
pub async fn start(
    State(state): State<AppState>,
    OptionalAuth(shopper): OptionalAuth,
    session: Session,
) -> Result<Json<CheckoutView>> {
    // A fresh start always discards any previous wizard state.
    if let Ok(Some(old_key)) = session.get::<String>(session_keys::CHECKOUT).await {
        state.checkouts().end(&old_key).await;
    }

    let checkout = match &shopper {
        Some(shopper) => {
            let profile = state
                .identity()
                .profile_details(&shopper.credential.token)
                .await?;
            CheckoutSession::for_account(&profile, masked_card_of(&profile))
        }
        None => CheckoutSession::for_guest(),
    };

    let view = CheckoutView::of(&checkout);
    let key = state.checkouts().start(checkout).await;
    session.insert(session_keys::CHECKOUT, &key).await?;
    Ok(Json(view))
}

fn masked_card_of(profile: &ProfileDetails) -> Option<MaskedCardState> {
    profile.default_card.as_ref().map(|card| MaskedCardState {
        card_id: card.id,
        final_digits: card.final_digits.clone(),
        expiration: card.expiration.clone(),
    })
}

/// GET /checkout - the current wizard state.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    let checkout = live_checkout(&state, &session).await?;
    let checkout = checkout.lock().await;
    Ok(Json(CheckoutView::of(&checkout)))
}

/// PATCH /checkout/form - apply a field patch.
#[instrument(skip_all)]
pub async fn patch_form(
    State(state): State<AppState>,
    session: Session,
    Json(patch): Json<CheckoutFormPatch>,
) -> Result<Json<CheckoutView>> {
    let checkout = live_checkout(&state, &session).await?;
    let mut checkout = checkout.lock().await;
    checkout.apply_patch(patch);
    Ok(Json(CheckoutView::of(&checkout)))
}

#[derive(Debug, Deserialize)]
pub struct GoToStepBody {
    pub step: CheckoutStep,
}

/// POST /checkout/step - move the wizard.
///
/// A refused move to Payment responds 422 with the wizard parked on the
/// failing step and its errors filled in.
#[instrument(skip_all, fields(target = body.step.number()))]
pub async fn go_to_step(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<GoToStepBody>,
) -> Result<Response> {
    let checkout = live_checkout(&state, &session).await?;
    let mut checkout = checkout.lock().await;
    match checkout.go_to(body.step) {
        Ok(_) => Ok(Json(CheckoutView::of(&checkout)).into_response()),
        Err(_) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(CheckoutView::of(&checkout)),
        )
            .into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct BlurBody {
    pub field: String,
    pub value: String,
}

/// POST /checkout/validate-field - blur-time validation of one field.
///
/// Applies the value, runs the format check, and for guests also the
/// server-side uniqueness check (email / tax id).
#[instrument(skip_all, fields(field = %body.field))]
pub async fn blur_validate(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<BlurBody>,
) -> Result<Json<FormErrors>> {
    let checkout = live_checkout(&state, &session).await?;
    let mut checkout = checkout.lock().await;

    let mut patch = CheckoutFormPatch::default();
    let message = validate::field_error(&body.field, &body.value);
    let guest = !checkout.authenticated;
    match body.field.as_str() {
        "email" => {
            patch.email = Some(body.value.clone());
            checkout.errors.email = message;
            if guest {
                checkout.errors.email_in_use =
                    validate::email_conflict(state.identity(), &body.value).await;
            }
        }
        "phone" => {
            patch.phone = Some(body.value.clone());
            checkout.errors.phone = message;
        }
        "cpf" => {
            patch.cpf = Some(body.value.clone());
            checkout.errors.cpf = message;
            if guest {
                checkout.errors.document_in_use =
                    validate::document_conflict(state.identity(), &body.value).await;
            }
        }
        "cnpj" => {
            patch.cnpj = Some(body.value.clone());
            checkout.errors.cnpj = message;
            if guest {
                checkout.errors.document_in_use =
                    validate::document_conflict(state.identity(), &body.value).await;
            }
        }
        _ => return Err(AppError::BadRequest(format!("unknown field {}", body.field))),
    }
    checkout.apply_patch(patch);

    Ok(Json(checkout.errors.clone()))
}

/// GET /checkout/postal/{cep} - postal lookup with shipping autofill.
///
/// Best-effort: a miss or a failing lookup service returns an empty
/// result and never blocks checkout.
#[instrument(skip_all, fields(cep = %cep))]
pub async fn postal_autofill(
    State(state): State<AppState>,
    session: Session,
    Path(cep): Path<String>,
) -> Result<Json<Option<PostalAddress>>> {
    let Some(address) = lookup_postal(state.postal(), &cep).await else {
        return Ok(Json(None));
    };

    // Autofill only touches a live wizard; the lookup itself works
    // without one.
    if let Ok(checkout) = live_checkout(&state, &session).await {
        let mut checkout = checkout.lock().await;
        checkout.apply_patch(CheckoutFormPatch {
            postal_code: Some(cep),
            street: address.street.clone(),
            neighborhood: address.neighborhood.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            ..CheckoutFormPatch::default()
        });
    }

    Ok(Json(Some(address)))
}

/// Run the lookup, degrading a backend failure to "no match".
async fn lookup_postal<P: PostalLookupApi>(postal: &P, cep: &str) -> Option<PostalAddress> {
    match postal.lookup(cep).await {
        Ok(address) => address,
        Err(e) => {
            warn!(error = %e, "postal lookup failed, shopper types the address");
            None
        }
    }
}

/// The response to a successful payment submit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub order_id: OrderId,
    pub destination: String,
}

/// POST /checkout/submit - provision the account (guests) and dispatch
/// the payment.
///
/// On failure the wizard stays on the Payment step for a retry; stages
/// provisioning already completed are not rolled back.
#[instrument(skip_all, fields(authenticated = shopper.is_some()))]
pub async fn submit(
    State(state): State<AppState>,
    OptionalAuth(shopper): OptionalAuth,
    session: Session,
) -> Result<Json<SubmitResponse>> {
    let checkout = live_checkout(&state, &session).await?;
    let mut checkout = checkout.lock().await;

    if checkout.step != CheckoutStep::Payment {
        return Err(AppError::Validation(
            "Complete the earlier checkout steps first.".to_string(),
        ));
    }

    // The cart to charge is the one the shopper has been building, under
    // the auth state this request arrived with.
    let cart_session = cart_session(&state, session.clone(), shopper.as_ref());
    let cart = cart_session.fetch_cart().await?;
    if cart.items.is_empty() {
        return Err(AppError::Validation("Your cart is empty.".to_string()));
    }

    let account = match &shopper {
        Some(shopper) => resolve_account(state.identity(), &shopper.credential.token).await?,
        None => {
            if let Some(message) = validate::password_pair_error(
                &checkout.form.password,
                &checkout.form.password_confirmation,
            ) {
                checkout.errors.password = Some(message.clone());
                return Err(AppError::Validation(message));
            }
            provision_guest(
                state.identity(),
                &checkout.form,
                state.config().checkout.provisioning_settle,
            )
            .await?
        }
    };

    // Registration signs the new account in; persist that before the
    // charge so a gateway failure still leaves the shopper signed in.
    let credential = match (&shopper, &account.credential) {
        (Some(shopper), _) => shopper.credential.clone(),
        (None, Some(fresh)) => {
            let current = CurrentShopper {
                email: checkout.form.email.trim().to_string(),
                credential: fresh.clone(),
            };
            set_current_shopper(&session, &current).await?;
            set_sentry_user(&account.profile_id, Some(&current.email));
            fresh.clone()
        }
        (None, None) => {
            return Err(AppError::Internal(
                "provisioning returned no credential".to_string(),
            ));
        }
    };

    let subtotal = cart.effective_subtotal();
    let outcome = dispatch_payment(
        state.identity(),
        state.payment(),
        PaymentRequest {
            form: &checkout.form,
            masked_card: checkout.masked_card.as_ref(),
            account: &account,
            credential: &credential.token,
            subtotal,
            total: order_total(&cart, subtotal),
            pix_discount_percent: state.config().checkout.pix_discount_percent,
        },
    )
    .await?;

    // The order exists now. Cart cleanup is best-effort; a failure here
    // must not turn a successful charge into an error response.
    if let Err(e) = cart_session.clear_items().await {
        warn!(error = %e, "cart not cleared after successful payment");
    }
    if let Ok(Some(key)) = session.get::<String>(session_keys::CHECKOUT).await {
        state.checkouts().end(&key).await;
    }
    let _ = session.remove::<String>(session_keys::CHECKOUT).await;

    Ok(Json(SubmitResponse {
        order_id: outcome.order_id,
        destination: outcome.destination,
    }))
}

fn order_total(cart: &Cart, subtotal: rust_decimal::Decimal) -> rust_decimal::Decimal {
    if cart.total > rust_decimal::Decimal::ZERO {
        cart.total
    } else {
        subtotal
    }
}

/// Fetch the live wizard behind the session's registry key.
async fn live_checkout(
    state: &AppState,
    session: &Session,
) -> Result<std::sync::Arc<tokio::sync::Mutex<CheckoutSession>>> {
    let key: Option<String> = session.get(session_keys::CHECKOUT).await?;
    let key = key.ok_or_else(|| AppError::NotFound("no checkout in progress".to_string()))?;
    state
        .checkouts()
        .get(&key)
        .await
        .ok_or_else(|| AppError::NotFound("checkout session expired".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ApiError;

    struct FakePostal {
        response: std::result::Result<Option<PostalAddress>, ()>,
    }

    impl PostalLookupApi for FakePostal {
        async fn lookup(
            &self,
            _postal_code: &str,
        ) -> std::result::Result<Option<PostalAddress>, ApiError> {
            match &self.response {
                Ok(address) => Ok(address.clone()),
                Err(()) => Err(ApiError::Status {
                    status: 500,
                    message: "lookup backend down".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn postal_lookup_hit_passes_the_address_through() {
        let postal = FakePostal {
            response: Ok(Some(PostalAddress {
                street: Some("Rua Augusta".to_string()),
                neighborhood: Some("Consolação".to_string()),
                city: Some("São Paulo".to_string()),
                state: Some("SP".to_string()),
            })),
        };

        let address = lookup_postal(&postal, "01305-000").await;
        assert_eq!(address.and_then(|a| a.city), Some("São Paulo".to_string()));
    }

    #[tokio::test]
    async fn postal_lookup_failure_degrades_to_no_match() {
        let postal = FakePostal { response: Err(()) };
        assert!(lookup_postal(&postal, "01305-000").await.is_none());
    }
}
