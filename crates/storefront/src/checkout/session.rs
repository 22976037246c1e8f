//! Checkout session: the three-step wizard state machine and the
//! in-memory registry holding live sessions.
//!
//! Moves back to Personal Info or Shipping are always allowed; the move
//! to Payment is gated on both earlier groups validating, and the machine
//! parks itself on the first failing step. The current step is never
//! persisted: a reload starts the wizard over.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::clients::ProfileDetails;

use super::form::{
    CheckoutFormData, CheckoutFormPatch, CheckoutStep, FormErrors, MaskedCardState, ProfileKind,
};
use super::validate::{validate_personal_info, validate_shipping};

/// A transition to Payment was refused.
#[derive(Debug, thiserror::Error)]
#[error("checkout blocked on step {}", step.number())]
pub struct StepBlocked {
    /// The step the machine parked on.
    pub step: CheckoutStep,
    /// The validation failures of that step's group.
    pub errors: FormErrors,
}

/// One shopper's wizard state.
#[derive(Debug)]
pub struct CheckoutSession {
    /// Current step.
    pub step: CheckoutStep,
    /// The whole form.
    pub form: CheckoutFormData,
    /// Latest validation results.
    pub errors: FormErrors,
    /// Stored card on file, when the account has one.
    pub masked_card: Option<MaskedCardState>,
    /// Whether the shopper was authenticated when the session started.
    pub authenticated: bool,
}

impl CheckoutSession {
    /// Fresh session for a guest.
    #[must_use]
    pub fn for_guest() -> Self {
        Self {
            step: CheckoutStep::PersonalInfo,
            form: CheckoutFormData::default(),
            errors: FormErrors::default(),
            masked_card: None,
            authenticated: false,
        }
    }

    /// Fresh session for an authenticated shopper: identity fields are
    /// pre-populated from the profile and locked for the session's
    /// lifetime. The profile kind cannot change mid-session.
    #[must_use]
    pub fn for_account(profile: &ProfileDetails, masked_card: Option<MaskedCardState>) -> Self {
        let mut form = CheckoutFormData {
            email: profile.email.clone(),
            ..CheckoutFormData::default()
        };
        if let Some(name) = &profile.full_name {
            form.full_name = name.clone();
        }
        if let Some(phone) = &profile.phone {
            form.phone = phone.clone();
        }
        if let Some(cpf) = &profile.cpf {
            form.cpf = cpf.clone();
        }
        if let Some(cnpj) = &profile.cnpj {
            form.cnpj = cnpj.clone();
        }
        if profile.profile_kind.as_deref() == Some("PJ") {
            form.profile_kind = ProfileKind::Business;
        }

        Self {
            step: CheckoutStep::PersonalInfo,
            form,
            errors: FormErrors::default(),
            masked_card,
            authenticated: true,
        }
    }

    /// Apply a field patch. For authenticated shoppers the identity
    /// fields are locked, so those parts of the patch are discarded.
    /// Editing the email or tax id clears its stale server-conflict flag
    /// until the next blur check.
    pub fn apply_patch(&mut self, mut patch: CheckoutFormPatch) {
        if self.authenticated {
            patch.profile_kind = None;
            patch.full_name = None;
            patch.email = None;
            patch.phone = None;
            patch.cpf = None;
            patch.cnpj = None;
        }
        if patch.email.is_some() {
            self.errors.email_in_use = false;
        }
        if patch.cpf.is_some() || patch.cnpj.is_some() {
            self.errors.document_in_use = false;
        }
        patch.apply_to(&mut self.form);
    }

    /// Move the wizard. Backward and lateral moves always succeed; the
    /// move to Payment validates the Personal Info group first and then
    /// the Shipping group, parking on the first group that fails.
    ///
    /// # Errors
    ///
    /// Returns [`StepBlocked`] naming the failing step and its errors.
    pub fn go_to(&mut self, target: CheckoutStep) -> Result<CheckoutStep, StepBlocked> {
        if target != CheckoutStep::Payment {
            self.step = target;
            return Ok(self.step);
        }

        let personal = validate_personal_info(&self.form, self.authenticated, &self.errors);
        if !personal.is_clear() {
            debug!(step = 1, "payment transition blocked");
            self.step = CheckoutStep::PersonalInfo;
            self.errors = personal.clone();
            return Err(StepBlocked {
                step: CheckoutStep::PersonalInfo,
                errors: personal,
            });
        }

        let shipping = validate_shipping(&self.form);
        if !shipping.is_clear() {
            debug!(step = 2, "payment transition blocked");
            self.step = CheckoutStep::Shipping;
            self.errors = shipping.clone();
            return Err(StepBlocked {
                step: CheckoutStep::Shipping,
                errors: shipping,
            });
        }

        self.errors = FormErrors::default();
        self.step = CheckoutStep::Payment;
        Ok(self.step)
    }
}

/// In-memory registry of live checkout sessions, keyed by an opaque id
/// stored in the shopper's session. Idle sessions expire, which is how
/// abandonment is modeled.
#[derive(Clone)]
pub struct CheckoutRegistry {
    sessions: moka::future::Cache<String, Arc<Mutex<CheckoutSession>>>,
}

impl CheckoutRegistry {
    /// Create a registry whose sessions expire after `idle` without use.
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        Self {
            sessions: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_idle(idle)
                .build(),
        }
    }

    /// Register a fresh session and return its key.
    pub async fn start(&self, session: CheckoutSession) -> String {
        let key = uuid::Uuid::new_v4().to_string();
        self.sessions
            .insert(key.clone(), Arc::new(Mutex::new(session)))
            .await;
        key
    }

    /// Look up a live session.
    pub async fn get(&self, key: &str) -> Option<Arc<Mutex<CheckoutSession>>> {
        self.sessions.get(key).await
    }

    /// Discard a session (payment success or explicit abandonment).
    pub async fn end(&self, key: &str) {
        self.sessions.invalidate(key).await;
    }
}
