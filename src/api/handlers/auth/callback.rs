//! Provider callback handling.
//!
//! Every provider lands on the same handler: verify/normalize the payload
//! into a `Profile`, resolve it to a user record, establish the session.
//! "Access denied" is a first-class outcome, not an error; protocol errors
//! are logged and answered with a generic notice. No path here ever
//! surfaces an unhandled fault to the browser.

use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::identity::{resolver, UserStore, WriteBehindQueue};
use crate::providers::{federated, oauth, profile, Profile, Provider};

use super::flash::{flash_redirect, Category};
use super::redirect::{sanitize_next, signin_url};
use super::session::establish;
use super::state::AuthState;

/// Outcome of extracting a verified profile from the callback.
enum CallbackOutcome {
    Verified(Profile),
    /// The visitor declined consent or the platform asserted no identity.
    Denied,
    Protocol(anyhow::Error),
}

#[utoipa::path(
    get,
    path = "/_s/callback/{provider}/authorized/",
    params(("provider" = String, Path, description = "Provider name")),
    responses(
        (status = 303, description = "Sign-in concluded; redirect to the next URL or back to sign-in"),
        (status = 404, description = "Unknown or unconfigured provider")
    ),
    tag = "auth"
)]
pub async fn authorized(
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(store): Extension<Arc<dyn UserStore>>,
    Extension(queue): Extension<WriteBehindQueue>,
) -> Response {
    let Some(provider) = Provider::parse(&provider) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // OAuth providers echo the hint back in `state`; the federated flow
    // carries it on the callback URL itself.
    let next = sanitize_next(
        params
            .get("state")
            .or_else(|| params.get("next"))
            .map(String::as_str),
    );

    let outcome = match provider {
        Provider::Federated => match federated::profile_from_headers(&headers) {
            Some(profile) => CallbackOutcome::Verified(profile),
            None => CallbackOutcome::Denied,
        },
        _ => oauth_outcome(&state, provider, &params).await,
    };

    match outcome {
        CallbackOutcome::Denied => {
            // Expected flow, never logged as a failure.
            flash_redirect(
                Category::Notice,
                "You denied the request to sign in.",
                &next,
            )
        }
        CallbackOutcome::Protocol(err) => {
            error!("{provider} callback could not be verified: {err:#}");
            flash_redirect(
                Category::Danger,
                &format!("Something went wrong with {provider} sign in. Please try again."),
                &signin_url(&next),
            )
        }
        CallbackOutcome::Verified(profile) => {
            let resolution = match resolver::resolve(store.as_ref(), provider, &profile).await {
                Ok(resolution) => resolution,
                Err(err) => {
                    error!("failed to resolve {provider} identity: {err:#}");
                    return flash_redirect(
                        Category::Danger,
                        &format!(
                            "Something went wrong with {provider} sign in. Please try again."
                        ),
                        &signin_url(&next),
                    );
                }
            };
            info!(
                provider = %provider,
                user_id = resolution.user.id,
                username = %resolution.user.username,
                "sign-in resolved"
            );
            establish(&state, store.as_ref(), &queue, Some(resolution), &next).await
        }
    }
}

/// Run the OAuth2 leg: denied check, code exchange, profile fetch,
/// normalization.
async fn oauth_outcome(
    state: &AuthState,
    provider: Provider,
    params: &HashMap<String, String>,
) -> CallbackOutcome {
    // Providers report declined consent via `error` (e.g. access_denied).
    if params.contains_key("error") || params.contains_key("denied") {
        return CallbackOutcome::Denied;
    }
    let Some(credentials) = state.config().credentials(provider) else {
        return CallbackOutcome::Protocol(anyhow::anyhow!(
            "{provider} callback received but provider is not configured"
        ));
    };
    let Some(code) = params.get("code").filter(|code| !code.is_empty()) else {
        return CallbackOutcome::Protocol(anyhow::anyhow!(
            "{provider} callback missing authorization code"
        ));
    };

    let redirect_uri = state.config().callback_url(provider);
    let token = match oauth::exchange_code(
        state.http(),
        provider,
        credentials,
        code,
        &redirect_uri,
    )
    .await
    {
        Ok(token) => token,
        Err(err) => return CallbackOutcome::Protocol(err),
    };
    let payload = match oauth::fetch_profile(state.http(), provider, &token).await {
        Ok(payload) => payload,
        Err(err) => return CallbackOutcome::Protocol(err),
    };
    match profile::normalize(provider, &payload) {
        Ok(profile) => CallbackOutcome::Verified(profile),
        Err(err) => CallbackOutcome::Protocol(err),
    }
}
