//! Checkout form validation.
//!
//! Local checks (format, required fields, password pair) never touch the
//! network. Uniqueness checks against the identity backend run on field
//! blur and only for guests; an authenticated shopper's identity is
//! already canonical.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use varejo_core::{Cnpj, Cpf, Email};

use crate::clients::IdentityApi;

use super::form::{CheckoutFormData, FormErrors, ProfileKind};

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?\d{2}\)?[\s-]?9?\d{4}-?\d{4}$").expect("Invalid regex"));

const MIN_PASSWORD_LEN: usize = 6;

/// Validate the phone format. Empty input is handled by the required-field
/// checks, not here.
#[must_use]
pub fn phone_format_ok(phone: &str) -> bool {
    PHONE_RE.is_match(phone.trim())
}

/// Format-level check of one field, as run on blur. Returns the error
/// message for the field, or `None` when it passes.
#[must_use]
pub fn field_error(field: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match field {
        "email" => Email::parse(value)
            .err()
            .map(|_| "Enter a valid email address.".to_string()),
        "phone" => (!phone_format_ok(value)).then(|| "Enter a valid phone number.".to_string()),
        "cpf" => Cpf::parse(value)
            .err()
            .map(|_| "Enter a valid CPF.".to_string()),
        "cnpj" => Cnpj::parse(value)
            .err()
            .map(|_| "Enter a valid CNPJ.".to_string()),
        _ => None,
    }
}

/// Check the password pair: both entered, matching, and long enough.
#[must_use]
pub fn password_pair_error(password: &str, confirmation: &str) -> Option<String> {
    if password.is_empty() || confirmation.is_empty() {
        return Some("Enter the password twice.".to_string());
    }
    if password != confirmation {
        return Some("Passwords do not match.".to_string());
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Some(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    None
}

/// Validate the Personal Info group for the active profile kind.
///
/// `authenticated` relaxes the guest-only requirements: phone and the
/// password pair are not demanded because the account already has them.
/// Existing server-conflict flags are carried over so an outstanding
/// duplicate email/tax-id still blocks the transition.
#[must_use]
pub fn validate_personal_info(
    form: &CheckoutFormData,
    authenticated: bool,
    previous: &FormErrors,
) -> FormErrors {
    let mut errors = FormErrors {
        email_in_use: previous.email_in_use,
        document_in_use: previous.document_in_use,
        ..FormErrors::default()
    };

    let mut require = |name: &str, value: &str| {
        if value.trim().is_empty() {
            errors.missing.push(name.to_string());
        }
    };

    require("fullName", &form.full_name);
    require("email", &form.email);
    if !authenticated {
        require("phone", &form.phone);
    }
    match form.profile_kind {
        ProfileKind::Individual => require("cpf", &form.cpf),
        ProfileKind::Business => {
            require("cnpj", &form.cnpj);
            require("companyName", &form.company_name);
        }
    }

    if !form.email.trim().is_empty() {
        errors.email = field_error("email", &form.email);
    }
    // Phone format only matters when a phone was actually provided.
    if !form.phone.trim().is_empty() && !phone_format_ok(&form.phone) {
        errors.phone = Some("Enter a valid phone number.".to_string());
    }
    match form.profile_kind {
        ProfileKind::Individual if !form.cpf.trim().is_empty() => {
            errors.cpf = field_error("cpf", &form.cpf);
        }
        ProfileKind::Business if !form.cnpj.trim().is_empty() => {
            errors.cnpj = field_error("cnpj", &form.cnpj);
        }
        _ => {}
    }

    if !authenticated && (form.password.is_empty() || form.password_confirmation.is_empty()) {
        errors.password = Some("Enter the password twice.".to_string());
    }

    errors
}

/// Validate the Shipping group: all address fields are required.
#[must_use]
pub fn validate_shipping(form: &CheckoutFormData) -> FormErrors {
    let mut errors = FormErrors::default();
    for (name, value) in [
        ("postalCode", &form.postal_code),
        ("number", &form.number),
        ("street", &form.street),
        ("state", &form.state),
        ("city", &form.city),
        ("neighborhood", &form.neighborhood),
    ] {
        if value.trim().is_empty() {
            errors.missing.push(name.to_string());
        }
    }
    errors
}

/// Blur-time uniqueness check for the email field. Guests only; lookup
/// failures are treated as "not in use" so a flaky backend cannot block
/// typing.
pub async fn email_conflict<I: IdentityApi>(identity: &I, email: &str) -> bool {
    if email.trim().is_empty() {
        return false;
    }
    match identity.email_in_use(email.trim()).await {
        Ok(in_use) => in_use,
        Err(e) => {
            warn!(error = %e, "email uniqueness check failed");
            false
        }
    }
}

/// Blur-time uniqueness check for the active tax id. Guests only.
pub async fn document_conflict<I: IdentityApi>(identity: &I, document: &str) -> bool {
    if document.trim().is_empty() {
        return false;
    }
    match identity.document_in_use(document.trim()).await {
        Ok(in_use) => in_use,
        Err(e) => {
            warn!(error = %e, "document uniqueness check failed");
            false
        }
    }
}
