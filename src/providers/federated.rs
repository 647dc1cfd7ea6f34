//! Platform-managed identity provider.
//!
//! The fronting gateway authenticates the visitor itself and asserts the
//! verified identity on the callback request via trusted headers. The
//! gateway strips these headers from external traffic; they are only ever
//! set by the platform.

use axum::http::HeaderMap;
use url::form_urlencoded;

use super::Profile;

pub(crate) const USER_ID_HEADER: &str = "x-ensaluti-user-id";
pub(crate) const EMAIL_HEADER: &str = "x-ensaluti-user-email";
pub(crate) const NICKNAME_HEADER: &str = "x-ensaluti-user-nickname";
pub(crate) const ADMIN_HEADER: &str = "x-ensaluti-user-admin";

/// Read the platform-asserted identity off the callback request.
///
/// `None` means the platform declined to assert an identity (the visitor
/// cancelled or was not signed in); callers treat that as the "denied"
/// outcome, not as an error.
pub(crate) fn profile_from_headers(headers: &HeaderMap) -> Option<Profile> {
    let external_id = header_value(headers, USER_ID_HEADER)?;
    let email = header_value(headers, EMAIL_HEADER);
    let handle = header_value(headers, NICKNAME_HEADER)
        .or_else(|| email.clone())
        .unwrap_or_else(|| external_id.clone());
    let provider_admin = header_value(headers, ADMIN_HEADER)
        .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));

    Some(Profile {
        external_id,
        name: Some(display_name_from_nickname(&handle)),
        handle,
        email,
        provider_admin,
    })
}

/// Build the platform login URL with a `continue` hop back to our callback.
pub(crate) fn login_url(platform_login_url: &str, callback_url: &str) -> String {
    let separator = if platform_login_url.contains('?') {
        '&'
    } else {
        '?'
    };
    let encoded: String = form_urlencoded::byte_serialize(callback_url.as_bytes()).collect();
    format!("{platform_login_url}{separator}continue={encoded}")
}

/// Turn a nickname like `john.doe@example.com` into `John Doe`.
fn display_name_from_nickname(nickname: &str) -> String {
    nickname
        .split('@')
        .next()
        .unwrap_or_default()
        .replace('.', " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}
