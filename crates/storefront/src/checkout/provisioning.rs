//! Account provisioning sequencer.
//!
//! Runs when a guest submits payment: registration, a settle delay, a
//! profile fetch for the backend id, then profile update, phone, and
//! address. Strictly ordered and stop-on-first-failure; nothing already
//! created is rolled back. An account that exists with no address is an
//! accepted outcome, the shopper retries from where it stopped.

use std::fmt;
use std::time::Duration;

use tracing::{info, instrument};

use varejo_core::{AddressId, ProfileId};

use crate::clients::{
    AddressRequest, ApiError, AuthCredential, IdentityApi, ProfileUpdateRequest, SignUpRequest,
};

use super::form::{CheckoutFormData, ProfileKind};

/// The stage a provisioning run failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStage {
    /// Account registration.
    Registration,
    /// Post-settle profile fetch.
    ProfileFetch,
    /// Profile update with tax-id and business fields.
    ProfileUpdate,
    /// Phone attach.
    Phone,
    /// Address attach.
    Address,
}

impl fmt::Display for ProvisioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Registration => "registration",
            Self::ProfileFetch => "profile fetch",
            Self::ProfileUpdate => "profile update",
            Self::Phone => "phone",
            Self::Address => "address",
        };
        f.write_str(name)
    }
}

/// A provisioning run stopped. Prior stages stay committed.
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    /// A backend call failed at the named stage.
    #[error("account provisioning failed at {0}: {1}")]
    Backend(ProvisioningStage, #[source] ApiError),

    /// The profile came back without an id after the settle delay.
    #[error("profile has no id after registration")]
    MissingProfileId,
}

impl ProvisioningError {
    /// The stage the run stopped at.
    #[must_use]
    pub const fn stage(&self) -> ProvisioningStage {
        match self {
            Self::Backend(stage, _) => *stage,
            Self::MissingProfileId => ProvisioningStage::ProfileFetch,
        }
    }
}

/// What a successful run leaves behind.
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    /// Credential for the freshly signed-in account. `None` when the
    /// shopper was already authenticated.
    pub credential: Option<AuthCredential>,
    /// Backend profile id.
    pub profile_id: ProfileId,
    /// Id of the address attached from the Shipping step. `None` for the
    /// authenticated path, where the address is already on file.
    pub address_id: Option<AddressId>,
}

/// Provision an account for a guest from the completed checkout form.
///
/// # Errors
///
/// Returns [`ProvisioningError`] naming the stage that failed. Stages
/// already completed are not compensated.
#[instrument(skip_all, fields(profile_kind = form.profile_kind.as_str()))]
pub async fn provision_guest<I: IdentityApi>(
    identity: &I,
    form: &CheckoutFormData,
    settle: Duration,
) -> Result<ProvisionedAccount, ProvisioningError> {
    let credential = identity
        .sign_up(&sign_up_request(form))
        .await
        .map_err(|e| ProvisioningError::Backend(ProvisioningStage::Registration, e))?;
    info!("account registered");

    // The backend needs a moment before the new profile is readable.
    tokio::time::sleep(settle).await;

    let profile = identity
        .profile_details(&credential.token)
        .await
        .map_err(|e| ProvisioningError::Backend(ProvisioningStage::ProfileFetch, e))?;
    let profile_id = profile.id.ok_or(ProvisioningError::MissingProfileId)?;

    identity
        .update_profile(&credential.token, profile_id, &profile_update_request(form))
        .await
        .map_err(|e| ProvisioningError::Backend(ProvisioningStage::ProfileUpdate, e))?;

    if !form.phone.trim().is_empty() {
        identity
            .add_phone(&credential.token, profile_id, form.phone.trim())
            .await
            .map_err(|e| ProvisioningError::Backend(ProvisioningStage::Phone, e))?;
    }

    let address_id = identity
        .add_address(&credential.token, profile_id, &address_request(form))
        .await
        .map_err(|e| ProvisioningError::Backend(ProvisioningStage::Address, e))?;

    info!(%profile_id, %address_id, "account provisioned");
    Ok(ProvisionedAccount {
        credential: Some(credential),
        profile_id,
        address_id: Some(address_id),
    })
}

/// Resolve the profile id for an already-authenticated shopper. Profile,
/// phone, and address are assumed on file; no update is attempted.
///
/// # Errors
///
/// Returns [`ProvisioningError`] when the profile cannot be fetched or
/// lacks an id.
pub async fn resolve_account<I: IdentityApi>(
    identity: &I,
    credential: &str,
) -> Result<ProvisionedAccount, ProvisioningError> {
    let profile = identity
        .profile_details(credential)
        .await
        .map_err(|e| ProvisioningError::Backend(ProvisioningStage::ProfileFetch, e))?;
    let profile_id = profile.id.ok_or(ProvisioningError::MissingProfileId)?;
    Ok(ProvisionedAccount {
        credential: None,
        profile_id,
        address_id: None,
    })
}

fn sign_up_request(form: &CheckoutFormData) -> SignUpRequest {
    let business = form.profile_kind == ProfileKind::Business;
    SignUpRequest {
        email: form.email.trim().to_string(),
        password: form.password.clone(),
        full_name: form.full_name.trim().to_string(),
        profile_kind: form.profile_kind.as_str().to_string(),
        cpf: (!business).then(|| digits(&form.cpf)),
        cnpj: business.then(|| digits(&form.cnpj)),
        company_name: business.then(|| form.company_name.trim().to_string()),
    }
}

fn profile_update_request(form: &CheckoutFormData) -> ProfileUpdateRequest {
    let business = form.profile_kind == ProfileKind::Business;
    ProfileUpdateRequest {
        cpf: (!business).then(|| digits(&form.cpf)),
        cnpj: business.then(|| digits(&form.cnpj)),
        company_name: business.then(|| form.company_name.trim().to_string()),
        state_registration: (business && !form.state_registration.trim().is_empty())
            .then(|| form.state_registration.trim().to_string()),
    }
}

fn address_request(form: &CheckoutFormData) -> AddressRequest {
    AddressRequest {
        postal_code: digits(&form.postal_code),
        street: form.street.trim().to_string(),
        number: form.number.trim().to_string(),
        complement: (!form.complement.trim().is_empty())
            .then(|| form.complement.trim().to_string()),
        neighborhood: form.neighborhood.trim().to_string(),
        city: form.city.trim().to_string(),
        state: form.state.trim().to_string(),
        receiver_name: form.full_name.trim().to_string(),
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::clients::{CardRequest, ProfileDetails};
    use varejo_core::CardId;

    fn form() -> CheckoutFormData {
        CheckoutFormData {
            full_name: "Ana Souza".to_string(),
            email: "ana@example.com".to_string(),
            phone: "(11) 98765-4321".to_string(),
            cpf: "529.982.247-25".to_string(),
            password: "hunter22".to_string(),
            password_confirmation: "hunter22".to_string(),
            postal_code: "01310-100".to_string(),
            street: "Avenida Paulista".to_string(),
            number: "1578".to_string(),
            neighborhood: "Bela Vista".to_string(),
            city: "Sao Paulo".to_string(),
            state: "SP".to_string(),
            ..CheckoutFormData::default()
        }
    }

    /// Identity fake that records calls and can fail any one stage.
    #[derive(Default)]
    struct FakeIdentity {
        calls: Mutex<Vec<String>>,
        fail_at: Option<&'static str>,
        profile_id: Option<i64>,
    }

    impl FakeIdentity {
        fn with_profile() -> Self {
            Self {
                profile_id: Some(77),
                ..Self::default()
            }
        }

        fn failing_at(stage: &'static str) -> Self {
            Self {
                fail_at: Some(stage),
                profile_id: Some(77),
                ..Self::default()
            }
        }

        fn check(&self, call: &'static str) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(call.to_string());
            if self.fail_at == Some(call) {
                return Err(ApiError::Status {
                    status: 500,
                    message: format!("{call} down"),
                });
            }
            Ok(())
        }

        fn log(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl IdentityApi for FakeIdentity {
        async fn sign_up(&self, _request: &SignUpRequest) -> Result<AuthCredential, ApiError> {
            self.check("sign_up")?;
            Ok(AuthCredential {
                token: "tok".to_string(),
                expires_at: Utc::now() + ChronoDuration::days(3),
            })
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthCredential, ApiError> {
            self.check("sign_in")?;
            Ok(AuthCredential {
                token: "tok".to_string(),
                expires_at: Utc::now() + ChronoDuration::days(3),
            })
        }

        async fn profile_details(&self, _credential: &str) -> Result<ProfileDetails, ApiError> {
            self.check("profile_details")?;
            Ok(ProfileDetails {
                id: self.profile_id.map(ProfileId::new),
                email: "ana@example.com".to_string(),
                full_name: None,
                profile_kind: None,
                cpf: None,
                cnpj: None,
                phone: None,
                default_card: None,
            })
        }

        async fn update_profile(
            &self,
            _credential: &str,
            _profile_id: ProfileId,
            _request: &ProfileUpdateRequest,
        ) -> Result<(), ApiError> {
            self.check("update_profile")
        }

        async fn add_phone(
            &self,
            _credential: &str,
            _profile_id: ProfileId,
            _phone: &str,
        ) -> Result<(), ApiError> {
            self.check("add_phone")
        }

        async fn add_address(
            &self,
            _credential: &str,
            _profile_id: ProfileId,
            _request: &AddressRequest,
        ) -> Result<AddressId, ApiError> {
            self.check("add_address")?;
            Ok(AddressId::new(501))
        }

        async fn add_card(
            &self,
            _credential: &str,
            _profile_id: ProfileId,
            _request: &CardRequest,
        ) -> Result<CardId, ApiError> {
            self.check("add_card")?;
            Ok(CardId::new(31))
        }

        async fn email_in_use(&self, _email: &str) -> Result<bool, ApiError> {
            Ok(false)
        }

        async fn document_in_use(&self, _document: &str) -> Result<bool, ApiError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_guest_run_is_strictly_ordered() {
        let identity = FakeIdentity::with_profile();
        let account = provision_guest(&identity, &form(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(account.profile_id, ProfileId::new(77));
        assert_eq!(account.address_id, Some(AddressId::new(501)));
        assert!(account.credential.is_some());
        assert_eq!(
            identity.log(),
            vec![
                "sign_up",
                "profile_details",
                "update_profile",
                "add_phone",
                "add_address"
            ]
        );
    }

    #[tokio::test]
    async fn test_profile_update_failure_leaves_account_registered() {
        let identity = FakeIdentity::failing_at("update_profile");
        let err = provision_guest(&identity, &form(), Duration::ZERO)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), ProvisioningStage::ProfileUpdate);
        // The run stopped at the failing stage: registration happened and
        // no compensating call followed it.
        assert_eq!(
            identity.log(),
            vec!["sign_up", "profile_details", "update_profile"]
        );
    }

    #[tokio::test]
    async fn test_registration_failure_stops_everything() {
        let identity = FakeIdentity::failing_at("sign_up");
        let err = provision_guest(&identity, &form(), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), ProvisioningStage::Registration);
        assert_eq!(identity.log(), vec!["sign_up"]);
    }

    #[tokio::test]
    async fn test_missing_profile_id_aborts() {
        let identity = FakeIdentity::default();
        let err = provision_guest(&identity, &form(), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::MissingProfileId));
        assert_eq!(err.stage(), ProvisioningStage::ProfileFetch);
    }

    #[tokio::test]
    async fn test_phone_skipped_when_empty() {
        let identity = FakeIdentity::with_profile();
        let form = CheckoutFormData {
            phone: String::new(),
            ..form()
        };
        provision_guest(&identity, &form, Duration::ZERO)
            .await
            .unwrap();
        assert!(!identity.log().contains(&"add_phone".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_precedes_profile_fetch() {
        let identity = FakeIdentity::with_profile();
        let form = form();
        let run = provision_guest(&identity, &form, Duration::from_millis(500));
        tokio::pin!(run);

        // Nothing past sign_up can happen before the settle delay elapses.
        assert!(
            tokio::time::timeout(Duration::from_millis(100), run.as_mut())
                .await
                .is_err()
        );
        assert_eq!(identity.log(), vec!["sign_up"]);

        run.await.unwrap();
        assert!(identity.log().contains(&"profile_details".to_string()));
    }

    #[tokio::test]
    async fn test_authenticated_path_is_a_single_fetch() {
        let identity = FakeIdentity::with_profile();
        let account = resolve_account(&identity, "tok").await.unwrap();

        assert_eq!(account.profile_id, ProfileId::new(77));
        assert!(account.credential.is_none());
        assert!(account.address_id.is_none());
        assert_eq!(identity.log(), vec!["profile_details"]);
    }

    #[test]
    fn test_sign_up_request_by_profile_kind() {
        let request = sign_up_request(&form());
        assert_eq!(request.cpf.as_deref(), Some("52998224725"));
        assert!(request.cnpj.is_none());

        let business = CheckoutFormData {
            profile_kind: ProfileKind::Business,
            cnpj: "11.222.333/0001-81".to_string(),
            company_name: "Varejo Ltda".to_string(),
            ..form()
        };
        let request = sign_up_request(&business);
        assert_eq!(request.cnpj.as_deref(), Some("11222333000181"));
        assert!(request.cpf.is_none());
        assert_eq!(request.company_name.as_deref(), Some("Varejo Ltda"));
    }
}
