//! Payment dispatcher.
//!
//! Branches on the chosen method after a shared server-side eligibility
//! check. The credit-card branch charges either a stored card or the raw
//! entered fields, never a mix of the two; the PIX branch charges the
//! discounted subtotal and hands back a destination carrying the QR
//! payload. Clearing the cart after success is the caller's job.

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use varejo_core::OrderId;

use crate::clients::{
    ApiError, CardChargeRequest, CardRequest, IdentityApi, PaymentApi, PaymentValidateRequest,
    PixChargeRequest,
};

use super::form::{CheckoutFormData, MaskedCardState, PaymentMethod};
use super::provisioning::ProvisionedAccount;

/// A payment attempt failed. The shopper stays on the payment step.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Locally detected problem; nothing reached the network.
    #[error("{0}")]
    Validation(String),

    /// The gateway or the eligibility check refused the payment.
    #[error("{0}")]
    Gateway(String),

    /// Transport or backend failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A successful charge: the minted order and where to send the shopper.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// Order id minted by the gateway.
    pub order_id: OrderId,
    /// Destination path, query values already URL-encoded.
    pub destination: String,
}

/// Everything the dispatcher needs for one attempt.
pub struct PaymentRequest<'a> {
    /// The completed checkout form.
    pub form: &'a CheckoutFormData,
    /// Stored card on file, when reusing one.
    pub masked_card: Option<&'a MaskedCardState>,
    /// Outcome of account provisioning.
    pub account: &'a ProvisionedAccount,
    /// Credential to call the backends with.
    pub credential: &'a str,
    /// Pre-shipping subtotal, the base for the PIX discount.
    pub subtotal: Decimal,
    /// Full amount for a card charge.
    pub total: Decimal,
    /// PIX discount, in percent.
    pub pix_discount_percent: Decimal,
}

/// The PIX amount: a fixed-percentage discount off the pre-shipping
/// subtotal, rounded to cents.
#[must_use]
pub fn pix_amount(subtotal: Decimal, discount_percent: Decimal) -> Decimal {
    (subtotal * (Decimal::ONE_HUNDRED - discount_percent) / Decimal::ONE_HUNDRED).round_dp(2)
}

/// Run one payment attempt end to end.
///
/// # Errors
///
/// Returns [`PaymentError`]; the checkout session is left on the payment
/// step for a retry.
#[instrument(skip_all, fields(method = ?request.form.payment_method))]
pub async fn dispatch_payment<I: IdentityApi, P: PaymentApi>(
    identity: &I,
    payment: &P,
    request: PaymentRequest<'_>,
) -> Result<PaymentOutcome, PaymentError> {
    match request.form.payment_method {
        PaymentMethod::CreditCard => charge_card(identity, payment, &request).await,
        PaymentMethod::Pix => charge_pix(payment, &request).await,
    }
}

async fn charge_card<I: IdentityApi, P: PaymentApi>(
    identity: &I,
    payment: &P,
    request: &PaymentRequest<'_>,
) -> Result<PaymentOutcome, PaymentError> {
    let form = request.form;

    if request.masked_card.is_none() && !form.card_fields_complete() {
        return Err(PaymentError::Validation(
            "Fill in all card fields before paying.".to_string(),
        ));
    }

    // Persist the entered card first when asked to; a failure here aborts
    // before any charge is attempted.
    let saved_card_id = if request.masked_card.is_none() && form.save_card {
        let card = CardRequest {
            number: digits(&form.card_number),
            holder_name: form.card_holder.trim().to_string(),
            expiration: form.card_expiration.trim().to_string(),
            cvv: form.card_cvv.trim().to_string(),
        };
        let id = identity
            .add_card(request.credential, request.account.profile_id, &card)
            .await?;
        info!(card_id = %id, "card stored on profile");
        Some(id)
    } else {
        None
    };

    let validate_card_id = request.masked_card.map(|m| m.card_id).or(saved_card_id);
    ensure_eligible(payment, request, validate_card_id).await?;

    // Either the stored card's fields or the raw entered ones. The
    // masked placeholder expiry is display-only and must never be sent;
    // the stored card's true expiry goes instead.
    let charge = request.masked_card.map_or_else(
        || CardChargeRequest {
            amount: request.total,
            card_id: None,
            number: Some(digits(&form.card_number)),
            holder_name: Some(form.card_holder.trim().to_string()),
            expiration: form.card_expiration.trim().to_string(),
            cvv: Some(form.card_cvv.trim().to_string()),
            address_id: request.account.address_id,
        },
        |masked| CardChargeRequest {
            amount: request.total,
            card_id: Some(masked.card_id),
            number: None,
            holder_name: None,
            expiration: masked.expiration.clone(),
            cvv: None,
            address_id: request.account.address_id,
        },
    );

    let receipt = payment.charge_card(request.credential, &charge).await?;
    match (receipt.success, receipt.order_id) {
        (true, Some(order_id)) => {
            info!(%order_id, "card charge approved");
            Ok(PaymentOutcome {
                destination: format!(
                    "/checkout/confirmation?orderId={}",
                    urlencoding::encode(&order_id.to_string())
                ),
                order_id,
            })
        }
        _ => {
            warn!("card charge declined");
            Err(PaymentError::Gateway(receipt.message.unwrap_or_else(|| {
                "Payment was declined. Please try again.".to_string()
            })))
        }
    }
}

async fn charge_pix<P: PaymentApi>(
    payment: &P,
    request: &PaymentRequest<'_>,
) -> Result<PaymentOutcome, PaymentError> {
    ensure_eligible(payment, request, None).await?;

    let amount = pix_amount(request.subtotal, request.pix_discount_percent);
    let receipt = payment
        .charge_pix(
            request.credential,
            &PixChargeRequest {
                amount,
                address_id: request.account.address_id,
            },
        )
        .await?;

    match (receipt.success, receipt.order_id) {
        (true, Some(order_id)) => {
            info!(%order_id, %amount, "pix order created");
            Ok(PaymentOutcome {
                destination: format!(
                    "/checkout/pix?orderId={}&qrCode={}&key={}",
                    urlencoding::encode(&order_id.to_string()),
                    urlencoding::encode(receipt.qr_code.as_deref().unwrap_or_default()),
                    urlencoding::encode(receipt.key.as_deref().unwrap_or_default()),
                ),
                order_id,
            })
        }
        _ => {
            warn!("pix charge failed");
            Err(PaymentError::Gateway(receipt.message.unwrap_or_else(|| {
                "PIX payment failed. Please try again.".to_string()
            })))
        }
    }
}

/// Shared pre-check: the backend vets the chosen address/card before any
/// branch-specific charge.
async fn ensure_eligible<P: PaymentApi>(
    payment: &P,
    request: &PaymentRequest<'_>,
    card_id: Option<varejo_core::CardId>,
) -> Result<(), PaymentError> {
    let validation = payment
        .validate(
            request.credential,
            &PaymentValidateRequest {
                address_id: request.account.address_id,
                card_id,
            },
        )
        .await?;
    if validation.approved {
        Ok(())
    } else {
        Err(PaymentError::Gateway(validation.message.unwrap_or_else(
            || "Payment cannot be processed right now.".to_string(),
        )))
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::checkout::form::MASKED_EXPIRY_PLACEHOLDER;
    use crate::clients::{
        AddressRequest, AuthCredential, GatewayReceipt, PaymentValidation, PixReceipt,
        ProfileDetails, ProfileUpdateRequest, SignUpRequest,
    };
    use varejo_core::{AddressId, CardId, ProfileId};

    fn account() -> ProvisionedAccount {
        ProvisionedAccount {
            credential: None,
            profile_id: ProfileId::new(77),
            address_id: Some(AddressId::new(501)),
        }
    }

    fn card_form() -> CheckoutFormData {
        CheckoutFormData {
            card_number: "4111 1111 1111 1111".to_string(),
            card_holder: "ANA SOUZA".to_string(),
            card_expiration: "09/28".to_string(),
            card_cvv: "123".to_string(),
            ..CheckoutFormData::default()
        }
    }

    #[derive(Default)]
    struct FakePayment {
        approve_validation: Option<bool>,
        card_receipt: Option<GatewayReceipt>,
        pix_receipt: Option<PixReceipt>,
        charges: Mutex<Vec<CardChargeRequest>>,
        pix_charges: Mutex<Vec<PixChargeRequest>>,
    }

    impl PaymentApi for FakePayment {
        async fn validate(
            &self,
            _credential: &str,
            _request: &PaymentValidateRequest,
        ) -> Result<PaymentValidation, ApiError> {
            Ok(PaymentValidation {
                approved: self.approve_validation.unwrap_or(true),
                message: Some("ineligible address".to_string()),
            })
        }

        async fn charge_card(
            &self,
            _credential: &str,
            request: &CardChargeRequest,
        ) -> Result<GatewayReceipt, ApiError> {
            self.charges.lock().unwrap().push(request.clone());
            Ok(self.card_receipt.clone().unwrap_or(GatewayReceipt {
                success: true,
                order_id: Some(varejo_core::OrderId::new(9001)),
                message: None,
            }))
        }

        async fn charge_pix(
            &self,
            _credential: &str,
            request: &PixChargeRequest,
        ) -> Result<PixReceipt, ApiError> {
            self.pix_charges.lock().unwrap().push(request.clone());
            Ok(self.pix_receipt.clone().unwrap_or(PixReceipt {
                success: true,
                order_id: Some(varejo_core::OrderId::new(9002)),
                qr_code: Some("00020126 br.gov.bcb.pix".to_string()),
                key: Some("chave@varejo.dev".to_string()),
                message: None,
            }))
        }
    }

    /// Identity stub that only serves `add_card`, optionally failing it.
    #[derive(Default)]
    struct CardOnlyIdentity {
        fail_add_card: bool,
        saved: Mutex<Vec<CardRequest>>,
    }

    impl IdentityApi for CardOnlyIdentity {
        async fn sign_up(&self, _r: &SignUpRequest) -> Result<AuthCredential, ApiError> {
            unreachable!()
        }
        async fn sign_in(&self, _e: &str, _p: &str) -> Result<AuthCredential, ApiError> {
            unreachable!()
        }
        async fn profile_details(&self, _c: &str) -> Result<ProfileDetails, ApiError> {
            unreachable!()
        }
        async fn update_profile(
            &self,
            _c: &str,
            _p: ProfileId,
            _r: &ProfileUpdateRequest,
        ) -> Result<(), ApiError> {
            unreachable!()
        }
        async fn add_phone(&self, _c: &str, _p: ProfileId, _phone: &str) -> Result<(), ApiError> {
            unreachable!()
        }
        async fn add_address(
            &self,
            _c: &str,
            _p: ProfileId,
            _r: &AddressRequest,
        ) -> Result<AddressId, ApiError> {
            unreachable!()
        }
        async fn add_card(
            &self,
            _c: &str,
            _p: ProfileId,
            request: &CardRequest,
        ) -> Result<CardId, ApiError> {
            if self.fail_add_card {
                return Err(ApiError::Status {
                    status: 500,
                    message: "card store down".to_string(),
                });
            }
            self.saved.lock().unwrap().push(request.clone());
            Ok(CardId::new(31))
        }
        async fn email_in_use(&self, _e: &str) -> Result<bool, ApiError> {
            Ok(false)
        }
        async fn document_in_use(&self, _d: &str) -> Result<bool, ApiError> {
            Ok(false)
        }
    }

    fn request<'a>(
        form: &'a CheckoutFormData,
        masked: Option<&'a MaskedCardState>,
        account: &'a ProvisionedAccount,
    ) -> PaymentRequest<'a> {
        PaymentRequest {
            form,
            masked_card: masked,
            account,
            credential: "tok",
            subtotal: Decimal::new(10000, 2),
            total: Decimal::new(11500, 2),
            pix_discount_percent: Decimal::new(5, 0),
        }
    }

    #[test]
    fn test_pix_amount_five_percent_off_hundred() {
        let amount = pix_amount(Decimal::new(10000, 2), Decimal::new(5, 0));
        assert_eq!(amount, Decimal::new(9500, 2));
    }

    #[tokio::test]
    async fn test_card_charge_with_raw_fields() {
        let identity = CardOnlyIdentity::default();
        let payment = FakePayment::default();
        let form = card_form();
        let account = account();

        let outcome = dispatch_payment(&identity, &payment, request(&form, None, &account))
            .await
            .unwrap();
        assert_eq!(outcome.destination, "/checkout/confirmation?orderId=9001");

        let charges = payment.charges.lock().unwrap();
        assert_eq!(charges[0].number.as_deref(), Some("4111111111111111"));
        assert_eq!(charges[0].expiration, "09/28");
        assert!(charges[0].card_id.is_none());
    }

    #[tokio::test]
    async fn test_masked_card_substitutes_true_expiry() {
        let identity = CardOnlyIdentity::default();
        let payment = FakePayment::default();
        // The form holds only the display placeholders.
        let form = CheckoutFormData {
            card_number: "**** **** **** 1111".to_string(),
            card_expiration: MASKED_EXPIRY_PLACEHOLDER.to_string(),
            ..CheckoutFormData::default()
        };
        let masked = MaskedCardState {
            card_id: CardId::new(31),
            final_digits: "1111".to_string(),
            expiration: "12/27".to_string(),
        };
        let account = account();

        dispatch_payment(&identity, &payment, request(&form, Some(&masked), &account))
            .await
            .unwrap();

        let charges = payment.charges.lock().unwrap();
        assert_eq!(charges[0].card_id, Some(CardId::new(31)));
        assert_eq!(charges[0].expiration, "12/27");
        assert_ne!(charges[0].expiration, MASKED_EXPIRY_PLACEHOLDER);
        assert!(charges[0].number.is_none());
        assert!(charges[0].cvv.is_none());
    }

    #[tokio::test]
    async fn test_incomplete_card_fields_abort_before_gateway() {
        let identity = CardOnlyIdentity::default();
        let payment = FakePayment::default();
        let form = CheckoutFormData {
            card_cvv: String::new(),
            ..card_form()
        };
        let account = account();

        let err = dispatch_payment(&identity, &payment, request(&form, None, &account))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
        assert!(payment.charges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_card_failure_aborts_before_charge() {
        let identity = CardOnlyIdentity {
            fail_add_card: true,
            ..CardOnlyIdentity::default()
        };
        let payment = FakePayment::default();
        let form = CheckoutFormData {
            save_card: true,
            ..card_form()
        };
        let account = account();

        let err = dispatch_payment(&identity, &payment, request(&form, None, &account))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Api(_)));
        assert!(payment.charges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_eligibility_aborts_both_branches() {
        let identity = CardOnlyIdentity::default();
        let payment = FakePayment {
            approve_validation: Some(false),
            ..FakePayment::default()
        };
        let account = account();

        let form = card_form();
        let err = dispatch_payment(&identity, &payment, request(&form, None, &account))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(ref m) if m == "ineligible address"));
        assert!(payment.charges.lock().unwrap().is_empty());

        let form = CheckoutFormData {
            payment_method: PaymentMethod::Pix,
            ..CheckoutFormData::default()
        };
        let err = dispatch_payment(&identity, &payment, request(&form, None, &account))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
        assert!(payment.pix_charges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_decline_surfaces_message_verbatim() {
        let identity = CardOnlyIdentity::default();
        let payment = FakePayment {
            card_receipt: Some(GatewayReceipt {
                success: false,
                order_id: None,
                message: Some("insufficient funds".to_string()),
            }),
            ..FakePayment::default()
        };
        let form = card_form();
        let account = account();

        let err = dispatch_payment(&identity, &payment, request(&form, None, &account))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(ref m) if m == "insufficient funds"));
    }

    #[tokio::test]
    async fn test_pix_charges_discounted_subtotal_and_encodes_destination() {
        let identity = CardOnlyIdentity::default();
        let payment = FakePayment::default();
        let form = CheckoutFormData {
            payment_method: PaymentMethod::Pix,
            ..CheckoutFormData::default()
        };
        let account = account();

        let outcome = dispatch_payment(&identity, &payment, request(&form, None, &account))
            .await
            .unwrap();

        let charges = payment.pix_charges.lock().unwrap();
        assert_eq!(charges[0].amount, Decimal::new(9500, 2));
        drop(charges);

        // Spaces and separators in the QR payload are URL-encoded.
        assert!(outcome.destination.starts_with("/checkout/pix?orderId=9002"));
        assert!(outcome.destination.contains("qrCode=00020126%20br.gov.bcb.pix"));
        assert!(outcome.destination.contains("key=chave%40varejo.dev"));
    }
}
