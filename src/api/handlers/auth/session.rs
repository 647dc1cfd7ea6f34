//! Session tokens, cookies, and session establishment.
//!
//! The session token is opaque: 32 random bytes, base64url. Only its SHA-256
//! hash is stored; the raw value exists in the cookie alone. Establishment
//! is the single place a session comes into being after identity resolution.

use anyhow::{Context, Result};
use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::error;

use crate::identity::{Resolution, UserStore, WriteBehindQueue};

use super::flash::{flash_cookie, flash_redirect, Category};
use super::redirect::SIGNIN_PATH;
use super::state::{AuthConfig, AuthState};

const SESSION_COOKIE_NAME: &str = "ensaluti_session";

/// Establish a session for a resolved user and resolve the post-login
/// redirect.
///
/// `None` means resolution was denied or failed upstream: no session is
/// created, no state is mutated, and the caller is sent back to sign-in.
pub(crate) async fn establish(
    state: &AuthState,
    store: &dyn UserStore,
    queue: &WriteBehindQueue,
    resolution: Option<Resolution>,
    next: &str,
) -> Response {
    let Some(Resolution {
        user,
        pending_write,
    }) = resolution
    else {
        return Redirect::to(SIGNIN_PATH).into_response();
    };

    // Inactive records never get a session; nothing is persisted.
    if !user.active {
        return flash_redirect(
            Category::Danger,
            "Sorry, but you could not sign in.",
            SIGNIN_PATH,
        );
    }

    let token = match generate_session_token() {
        Ok(token) => token,
        Err(err) => {
            error!("failed to generate session token: {err:#}");
            return flash_redirect(
                Category::Danger,
                "Sorry, but you could not sign in.",
                SIGNIN_PATH,
            );
        }
    };
    let token_hash = hash_session_token(&token);
    if let Err(err) = store
        .insert_session(user.id, &token_hash, state.config().session_ttl_seconds())
        .await
    {
        error!("failed to persist session: {err:#}");
        return flash_redirect(
            Category::Danger,
            "Sorry, but you could not sign in.",
            SIGNIN_PATH,
        );
    }

    let mut headers = HeaderMap::new();
    match session_cookie(state.config(), &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("failed to build session cookie: {err}");
            return flash_redirect(
                Category::Danger,
                "Sorry, but you could not sign in.",
                SIGNIN_PATH,
            );
        }
    }

    // The redirect must not wait on the deferred record write.
    if pending_write {
        queue.enqueue(user.clone());
    }

    let welcome = format!(
        "Hello {}, welcome to {}!",
        user.name,
        state.config().brand_name()
    );
    if let Ok(cookie) = flash_cookie(Category::Success, &welcome) {
        headers.append(SET_COOKIE, cookie);
    }

    (headers, Redirect::to(next)).into_response()
}

/// New opaque session token; the raw value only ever reaches the cookie.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token; raw values never touch the store.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Secure `HttpOnly` cookie carrying the session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Delete the session referenced by the request, if any. Idempotent;
/// failures are logged and never surfaced.
pub(crate) async fn delete_current_session(headers: &HeaderMap, store: &dyn UserStore) {
    if let Some(token) = extract_session_token(headers) {
        if let Err(err) = store.delete_session(&hash_session_token(&token)).await {
            error!("failed to delete session: {err:#}");
        }
    }
}

/// Pull the session token off the request: bearer header first, then cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
