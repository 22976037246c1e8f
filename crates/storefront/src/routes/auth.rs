//! Sign-in and sign-out handlers.
//!
//! Signing in stores the credential in the session; the cart layer picks
//! the server-backed repository on the next request from that alone.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::clients::{ApiError, IdentityApi};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_shopper, set_current_shopper};
use crate::models::CurrentShopper;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub email: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// POST /auth/sign-in
#[instrument(skip_all, fields(email = %body.email))]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SignInBody>,
) -> Result<Json<SignInResponse>> {
    let credential = state
        .identity()
        .sign_in(&body.email, &body.password)
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) | ApiError::Status { status: 401, .. } => {
                AppError::Unauthorized("Invalid email or password.".to_string())
            }
            other => AppError::from(other),
        })?;

    let profile = state.identity().profile_details(&credential.token).await?;
    let shopper = CurrentShopper {
        email: body.email.trim().to_string(),
        credential,
    };
    set_current_shopper(&session, &shopper).await?;
    if let Some(id) = profile.id {
        set_sentry_user(&id, Some(&shopper.email));
    }

    Ok(Json(SignInResponse {
        expires_at: shopper.credential.expires_at,
        email: shopper.email,
    }))
}

/// POST /auth/sign-out
#[instrument(skip_all)]
pub async fn sign_out(session: Session) -> Result<StatusCode> {
    clear_current_shopper(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
