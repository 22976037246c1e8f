//! Checkout subsystem.
//!
//! A three-step wizard (personal info, shipping, payment) over one shared
//! form. Submitting payment provisions the account for guests, then
//! dispatches a credit-card or PIX charge.

pub mod form;
pub mod payment;
pub mod provisioning;
pub mod session;
pub mod validate;

pub use form::{
    CheckoutFormData, CheckoutFormPatch, CheckoutStep, FormErrors, MaskedCardState, PaymentMethod,
    ProfileKind,
};
pub use payment::{PaymentError, PaymentOutcome, PaymentRequest, dispatch_payment, pix_amount};
pub use provisioning::{
    ProvisionedAccount, ProvisioningError, ProvisioningStage, provision_guest, resolve_account,
};
pub use session::{CheckoutRegistry, CheckoutSession, StepBlocked};
