//! Identity backend client.
//!
//! Handles sign-in/sign-up and account provisioning: profile details and
//! updates, phone numbers, addresses, stored cards, and the uniqueness
//! checks the checkout form runs on field blur.
//!
//! Sign-up signs the new account in as a side effect, so both sign-in and
//! sign-up return an [`AuthCredential`] the caller stores in the session
//! (well-known cookie key, multi-day expiry).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use varejo_core::{AddressId, CardId, ProfileId};

use super::{ApiError, error_from_response, parse_json};

/// Capability contract for the identity backend.
pub trait IdentityApi: Send + Sync {
    /// Register a new account. Returns the credential for the fresh session.
    fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> impl Future<Output = Result<AuthCredential, ApiError>> + Send;

    /// Sign in with email and password.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthCredential, ApiError>> + Send;

    /// Fetch the profile behind a credential.
    fn profile_details(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<ProfileDetails, ApiError>> + Send;

    /// Update profile fields not covered by registration.
    fn update_profile(
        &self,
        credential: &str,
        profile_id: ProfileId,
        request: &ProfileUpdateRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Attach a phone number to the profile.
    fn add_phone(
        &self,
        credential: &str,
        profile_id: ProfileId,
        phone: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Attach an address to the profile.
    fn add_address(
        &self,
        credential: &str,
        profile_id: ProfileId,
        request: &AddressRequest,
    ) -> impl Future<Output = Result<AddressId, ApiError>> + Send;

    /// Store a payment card on the profile.
    fn add_card(
        &self,
        credential: &str,
        profile_id: ProfileId,
        request: &CardRequest,
    ) -> impl Future<Output = Result<CardId, ApiError>> + Send;

    /// Whether an email is already registered.
    fn email_in_use(&self, email: &str) -> impl Future<Output = Result<bool, ApiError>> + Send;

    /// Whether a tax document (CPF/CNPJ digits) is already registered.
    fn document_in_use(
        &self,
        document: &str,
    ) -> impl Future<Output = Result<bool, ApiError>> + Send;
}

// =============================================================================
// Wire Types
// =============================================================================

/// Credential returned by sign-in and sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCredential {
    /// Opaque bearer token.
    pub token: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl AuthCredential {
    /// Whether the credential is still usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Sign-up payload. The profile-kind-specific identity fields ride along
/// so the backend can validate them against the chosen kind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    /// Email address.
    pub email: String,
    /// Password.
    pub password: String,
    /// Full name (PF) or contact name (PJ).
    pub full_name: String,
    /// `"PF"` or `"PJ"`.
    pub profile_kind: String,
    /// CPF digits (PF).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    /// CNPJ digits (PJ).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    /// Company legal name (PJ).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

/// Profile details returned by the backend.
///
/// `id` is optional on the wire: freshly registered profiles briefly
/// report without one, which the provisioning sequencer treats as a
/// failure after its settle delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    /// Backend profile id.
    pub id: Option<ProfileId>,
    /// Email address.
    pub email: String,
    /// Full name.
    pub full_name: Option<String>,
    /// `"PF"` or `"PJ"`.
    pub profile_kind: Option<String>,
    /// CPF digits.
    pub cpf: Option<String>,
    /// CNPJ digits.
    pub cnpj: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Default stored card, when one is on file.
    #[serde(default)]
    pub default_card: Option<StoredCardSummary>,
}

/// Summary of a card on file. The raw number and CVV are never returned
/// by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCardSummary {
    /// Backend card id.
    pub id: CardId,
    /// Last digits of the card number.
    pub final_digits: String,
    /// Expiry as `MM/YY`.
    pub expiration: String,
}

/// Profile update payload (fields registration does not cover).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    /// CPF digits (PF).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    /// CNPJ digits (PJ).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    /// Company legal name (PJ).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// State registration number (PJ).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_registration: Option<String>,
}

/// Address payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    /// Postal code (CEP digits).
    pub postal_code: String,
    /// Street name.
    pub street: String,
    /// Street number.
    pub number: String,
    /// Apartment / extra line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    /// Neighborhood.
    pub neighborhood: String,
    /// City.
    pub city: String,
    /// State (two-letter code).
    pub state: String,
    /// Recipient name.
    pub receiver_name: String,
}

/// Card payload for storing a new card on file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRequest {
    /// Full card number.
    pub number: String,
    /// Printed holder name.
    pub holder_name: String,
    /// Expiry as `MM/YY`.
    pub expiration: String,
    /// Security code.
    pub cvv: String,
}

#[derive(Debug, Serialize)]
struct SignInBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct PhoneBody<'a> {
    phone: &'a str,
}

#[derive(Debug, Deserialize)]
struct InUseBody {
    #[serde(alias = "exists", alias = "inUse")]
    in_use: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedId<T> {
    id: T,
}

// =============================================================================
// IdentityClient
// =============================================================================

/// HTTP client for the identity backend.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl IdentityClient {
    /// Create a new identity client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            inner: Arc::new(IdentityClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    async fn checked(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

impl IdentityApi for IdentityClient {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthCredential, ApiError> {
        let response =
            Self::checked(self.inner.client.post(self.url("/accounts")).json(request)).await?;
        parse_json(response).await
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthCredential, ApiError> {
        let body = SignInBody { email, password };
        let response =
            Self::checked(self.inner.client.post(self.url("/sessions")).json(&body)).await?;
        parse_json(response).await
    }

    #[instrument(skip(self, credential))]
    async fn profile_details(&self, credential: &str) -> Result<ProfileDetails, ApiError> {
        let response = Self::checked(
            self.inner
                .client
                .get(self.url("/profile"))
                .bearer_auth(credential),
        )
        .await?;
        parse_json(response).await
    }

    #[instrument(skip(self, credential, request), fields(profile_id = %profile_id))]
    async fn update_profile(
        &self,
        credential: &str,
        profile_id: ProfileId,
        request: &ProfileUpdateRequest,
    ) -> Result<(), ApiError> {
        Self::checked(
            self.inner
                .client
                .patch(self.url(&format!("/profile/{profile_id}")))
                .bearer_auth(credential)
                .json(request),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, credential, phone), fields(profile_id = %profile_id))]
    async fn add_phone(
        &self,
        credential: &str,
        profile_id: ProfileId,
        phone: &str,
    ) -> Result<(), ApiError> {
        let body = PhoneBody { phone };
        Self::checked(
            self.inner
                .client
                .post(self.url(&format!("/profile/{profile_id}/phones")))
                .bearer_auth(credential)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, credential, request), fields(profile_id = %profile_id))]
    async fn add_address(
        &self,
        credential: &str,
        profile_id: ProfileId,
        request: &AddressRequest,
    ) -> Result<AddressId, ApiError> {
        let response = Self::checked(
            self.inner
                .client
                .post(self.url(&format!("/profile/{profile_id}/addresses")))
                .bearer_auth(credential)
                .json(request),
        )
        .await?;
        let created: CreatedId<AddressId> = parse_json(response).await?;
        Ok(created.id)
    }

    #[instrument(skip_all, fields(profile_id = %profile_id))]
    async fn add_card(
        &self,
        credential: &str,
        profile_id: ProfileId,
        request: &CardRequest,
    ) -> Result<CardId, ApiError> {
        let response = Self::checked(
            self.inner
                .client
                .post(self.url(&format!("/profile/{profile_id}/cards")))
                .bearer_auth(credential)
                .json(request),
        )
        .await?;
        let created: CreatedId<CardId> = parse_json(response).await?;
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn email_in_use(&self, email: &str) -> Result<bool, ApiError> {
        let response = Self::checked(
            self.inner
                .client
                .get(self.url("/accounts/email-in-use"))
                .query(&[("email", email)]),
        )
        .await?;
        let body: InUseBody = parse_json(response).await?;
        Ok(body.in_use)
    }

    #[instrument(skip(self, document))]
    async fn document_in_use(&self, document: &str) -> Result<bool, ApiError> {
        let response = Self::checked(
            self.inner
                .client
                .get(self.url("/accounts/document-in-use"))
                .query(&[("document", document)]),
        )
        .await?;
        let body: InUseBody = parse_json(response).await?;
        Ok(body.in_use)
    }
}
