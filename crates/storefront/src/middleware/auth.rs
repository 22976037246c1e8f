//! Authentication middleware and extractors.
//!
//! Provides extractors for reading the signed-in shopper from the session
//! in route handlers. An expired credential counts as signed out.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::models::{CurrentShopper, session_keys};

/// Extractor that optionally gets the current shopper.
///
/// Every cart and checkout route works for guests too, so nothing here
/// rejects; an expired or missing credential yields `None`.
pub struct OptionalAuth(pub Option<CurrentShopper>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let shopper = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentShopper>(session_keys::CURRENT_SHOPPER)
                .await
                .ok()
                .flatten()
                .filter(CurrentShopper::is_valid),
            None => None,
        };

        Ok(Self(shopper))
    }
}

/// Helper to set the current shopper in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_shopper(
    session: &Session,
    shopper: &CurrentShopper,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_SHOPPER, shopper)
        .await
}

/// Helper to clear the current shopper from the session (sign-out).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_shopper(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentShopper>(session_keys::CURRENT_SHOPPER)
        .await?;
    Ok(())
}
