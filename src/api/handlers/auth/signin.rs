//! Sign-in entry, per-provider redirects, and sign-out.

use axum::extract::{Extension, Path, Query};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use url::form_urlencoded;
use utoipa::ToSchema;

use crate::identity::UserStore;
use crate::providers::{federated, oauth, Provider};

use super::flash::{flash_cookie, Category};
use super::redirect::{sanitize_next, WELCOME_PATH};
use super::session::{clear_session_cookie, delete_current_session};
use super::state::AuthState;

#[derive(Debug, Deserialize)]
pub struct NextParams {
    next: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SigninResponse {
    pub title: String,
    pub brand: String,
    pub next: String,
    pub providers: Vec<ProviderLink>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderLink {
    pub provider: String,
    pub signin_url: String,
}

/// List every configured provider as an individual sign-in link.
#[utoipa::path(
    get,
    path = "/signin/",
    responses(
        (status = 200, description = "Configured sign-in providers", body = SigninResponse)
    ),
    tag = "auth"
)]
pub async fn signin(
    Query(params): Query<NextParams>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let next = sanitize_next(params.next.as_deref());
    let encoded_next: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    let providers = state
        .config()
        .configured_providers()
        .into_iter()
        .map(|provider| ProviderLink {
            provider: provider.to_string(),
            signin_url: format!("/signin/{provider}/?next={encoded_next}"),
        })
        .collect();

    Json(SigninResponse {
        title: "Please sign in".to_string(),
        brand: state.config().brand_name().to_string(),
        next,
        providers,
    })
}

/// Redirect the browser into the provider's sign-in flow.
#[utoipa::path(
    get,
    path = "/signin/{provider}/",
    params(("provider" = String, Path, description = "Provider name")),
    responses(
        (status = 303, description = "Redirect to the provider authorize URL"),
        (status = 404, description = "Unknown or unconfigured provider")
    ),
    tag = "auth"
)]
pub async fn signin_provider(
    Path(provider): Path<String>,
    Query(params): Query<NextParams>,
    state: Extension<Arc<AuthState>>,
) -> Response {
    let Some(provider) = Provider::parse(&provider) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let next = sanitize_next(params.next.as_deref());

    if provider == Provider::Federated {
        let callback = callback_with_next(state.config().callback_url(provider), &next);
        let target = federated::login_url(state.config().federated_login_url(), &callback);
        return Redirect::to(&target).into_response();
    }

    let Some(credentials) = state.config().credentials(provider) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    // The next hint rides in `state` so the callback can restore it.
    match oauth::authorize_url(
        provider,
        credentials.client_id(),
        state.config().callback_url(provider).as_str(),
        &next,
    ) {
        Ok(target) => Redirect::to(&target).into_response(),
        Err(err) => {
            error!("failed to build {provider} authorize URL: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Clear the session and return to the landing page.
#[utoipa::path(
    get,
    path = "/signout/",
    responses(
        (status = 303, description = "Session cleared, redirect to the landing page")
    ),
    tag = "auth"
)]
pub async fn signout(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    Extension(store): Extension<Arc<dyn UserStore>>,
) -> Response {
    delete_current_session(&headers, store.as_ref()).await;

    // Always clear the cookie, even if no session row existed.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = flash_cookie(Category::Notice, "You have been signed out.") {
        response_headers.append(SET_COOKIE, cookie);
    }
    (response_headers, Redirect::to(WELCOME_PATH)).into_response()
}

/// The federated flow cannot carry OAuth `state`; the hint goes on the
/// callback URL itself.
fn callback_with_next(callback_url: String, next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{callback_url}?next={encoded}")
}
