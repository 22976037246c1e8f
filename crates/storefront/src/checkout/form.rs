//! Checkout form state.
//!
//! One mutable structure covers the whole wizard: identity, credentials,
//! shipping address, and payment fields. It is created with defaults when
//! a checkout session starts, patched field-by-field by the handlers, and
//! consumed wholesale by provisioning and the payment dispatcher.

use serde::{Deserialize, Serialize};

use varejo_core::CardId;

/// Placeholder expiry shown for a masked stored card. Never valid charge
/// data.
pub const MASKED_EXPIRY_PLACEHOLDER: &str = "XX/XX";

/// Individual (PF) or business (PJ) shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfileKind {
    /// Pessoa fisica.
    #[default]
    #[serde(rename = "PF")]
    Individual,
    /// Pessoa juridica.
    #[serde(rename = "PJ")]
    Business,
}

impl ProfileKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "PF",
            Self::Business => "PJ",
        }
    }
}

/// Chosen payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    /// Credit card, stored or freshly entered.
    #[default]
    CreditCard,
    /// PIX instant payment.
    Pix,
}

/// The three wizard steps. Current step is in-memory session state only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckoutStep {
    /// Step 1.
    PersonalInfo,
    /// Step 2.
    Shipping,
    /// Step 3.
    Payment,
}

impl CheckoutStep {
    /// 1-based step number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::PersonalInfo => 1,
            Self::Shipping => 2,
            Self::Payment => 3,
        }
    }
}

/// Everything the wizard collects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutFormData {
    /// PF or PJ.
    pub profile_kind: ProfileKind,

    // Identity.
    /// Full name (PF) or contact name (PJ).
    pub full_name: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
    /// CPF (PF tax id).
    pub cpf: String,
    /// CNPJ (PJ tax id).
    pub cnpj: String,
    /// Company legal name (PJ).
    pub company_name: String,
    /// State registration number (PJ).
    pub state_registration: String,

    // Credentials, only relevant for guests. Never echoed in responses.
    /// Password.
    #[serde(skip_serializing)]
    pub password: String,
    /// Password confirmation.
    #[serde(skip_serializing)]
    pub password_confirmation: String,

    // Shipping address.
    /// Postal code (CEP).
    pub postal_code: String,
    /// Street name.
    pub street: String,
    /// Street number.
    pub number: String,
    /// Apartment / extra line.
    pub complement: String,
    /// Neighborhood.
    pub neighborhood: String,
    /// City.
    pub city: String,
    /// State (two-letter code).
    pub state: String,

    // Payment.
    /// Chosen method.
    pub payment_method: PaymentMethod,
    /// Card number. Never echoed in responses.
    #[serde(skip_serializing)]
    pub card_number: String,
    /// Printed holder name.
    pub card_holder: String,
    /// Expiry as `MM/YY`.
    pub card_expiration: String,
    /// Security code. Never echoed in responses.
    #[serde(skip_serializing)]
    pub card_cvv: String,
    /// Whether to store the entered card on the profile.
    pub save_card: bool,
}

impl CheckoutFormData {
    /// The tax id for the active profile kind.
    #[must_use]
    pub fn tax_id(&self) -> &str {
        match self.profile_kind {
            ProfileKind::Individual => &self.cpf,
            ProfileKind::Business => &self.cnpj,
        }
    }

    /// Whether all raw card fields are filled in.
    #[must_use]
    pub fn card_fields_complete(&self) -> bool {
        !self.card_number.trim().is_empty()
            && !self.card_holder.trim().is_empty()
            && !self.card_expiration.trim().is_empty()
            && !self.card_cvv.trim().is_empty()
    }
}

/// A stored card, shown to the shopper only by its final digits and
/// expiry. When present, the raw card fields in [`CheckoutFormData`] hold
/// placeholders and must never reach the gateway as charge data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedCardState {
    /// Backend id of the stored card.
    pub card_id: CardId,
    /// Last digits of the card number.
    pub final_digits: String,
    /// The card's true expiry as `MM/YY`.
    pub expiration: String,
}

/// Per-field validation results. Derived state, recomputed on each
/// validation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormErrors {
    /// CPF format or check-digit failure.
    pub cpf: Option<String>,
    /// CNPJ format or check-digit failure.
    pub cnpj: Option<String>,
    /// Email format failure.
    pub email: Option<String>,
    /// Phone format failure.
    pub phone: Option<String>,
    /// Password pair failure (mismatch or too short).
    pub password: Option<String>,
    /// Missing required fields, by field name.
    pub missing: Vec<String>,
    /// Server reported the email as already registered.
    pub email_in_use: bool,
    /// Server reported the tax id as already registered.
    pub document_in_use: bool,
}

impl FormErrors {
    /// Whether no validation problem is outstanding.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.cpf.is_none()
            && self.cnpj.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.password.is_none()
            && self.missing.is_empty()
            && !self.email_in_use
            && !self.document_in_use
    }
}

/// Field-by-field patch applied by the form handlers. Absent fields are
/// left as they were.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutFormPatch {
    pub profile_kind: Option<ProfileKind>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
    pub company_name: Option<String>,
    pub state_registration: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub postal_code: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub card_number: Option<String>,
    pub card_holder: Option<String>,
    pub card_expiration: Option<String>,
    pub card_cvv: Option<String>,
    pub save_card: Option<bool>,
}

impl CheckoutFormPatch {
    /// Fold this patch into the form.
    pub fn apply_to(self, form: &mut CheckoutFormData) {
        macro_rules! patch {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    form.$field = value;
                })*
            };
        }
        patch!(
            profile_kind,
            full_name,
            email,
            phone,
            cpf,
            cnpj,
            company_name,
            state_registration,
            password,
            password_confirmation,
            postal_code,
            street,
            number,
            complement,
            neighborhood,
            city,
            state,
            payment_method,
            card_number,
            card_holder,
            card_expiration,
            card_cvv,
            save_card,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut form = CheckoutFormData {
            full_name: "Ana Souza".to_string(),
            email: "ana@example.com".to_string(),
            ..CheckoutFormData::default()
        };
        let patch = CheckoutFormPatch {
            email: Some("ana.souza@example.com".to_string()),
            ..CheckoutFormPatch::default()
        };
        patch.apply_to(&mut form);

        assert_eq!(form.email, "ana.souza@example.com");
        assert_eq!(form.full_name, "Ana Souza");
    }

    #[test]
    fn test_tax_id_follows_profile_kind() {
        let form = CheckoutFormData {
            profile_kind: ProfileKind::Business,
            cpf: "52998224725".to_string(),
            cnpj: "11222333000181".to_string(),
            ..CheckoutFormData::default()
        };
        assert_eq!(form.tax_id(), "11222333000181");
    }

    #[test]
    fn test_step_numbers() {
        assert_eq!(CheckoutStep::PersonalInfo.number(), 1);
        assert_eq!(CheckoutStep::Payment.number(), 3);
    }
}
