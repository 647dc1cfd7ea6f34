//! Post-login redirect target resolution.
//!
//! The `next` hint is attacker-controllable (it is echoed through the whole
//! OAuth round-trip), so it is only honored when it is a same-origin
//! relative path; anything else falls back to the default landing page.
//! A `next` pointing back at the sign-in page would loop, so it is replaced
//! too.

use url::form_urlencoded;

pub(crate) const SIGNIN_PATH: &str = "/signin/";
pub(crate) const LOGIN_PATH: &str = "/login/";
pub(crate) const WELCOME_PATH: &str = "/welcome/";

/// Validate a `next` hint into a safe redirect target.
pub(crate) fn sanitize_next(next: Option<&str>) -> String {
    let Some(next) = next.map(str::trim).filter(|next| !next.is_empty()) else {
        return WELCOME_PATH.to_string();
    };
    // Same-origin-relative only: "//host" and "https://host" both escape.
    if !next.starts_with('/') || next.starts_with("//") || next.contains('\\') {
        return WELCOME_PATH.to_string();
    }
    // Avoid the sign-in -> sign-in redirect loop.
    if next.starts_with(SIGNIN_PATH) || next.starts_with(LOGIN_PATH) {
        return WELCOME_PATH.to_string();
    }
    next.to_string()
}

/// Sign-in page URL carrying a return hint.
pub(crate) fn signin_url(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{SIGNIN_PATH}?next={encoded}")
}
