//! One-shot notification cookie for the presentation layer.
//!
//! The frontend reads and clears `ensaluti_flash`; correctness of sign-in
//! never depends on it. The payload is base64url so arbitrary message text
//! survives cookie encoding.

use axum::http::header::{InvalidHeaderValue, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use base64ct::{Base64UrlUnpadded, Encoding};

const FLASH_COOKIE_NAME: &str = "ensaluti_flash";
const FLASH_MAX_AGE_SECONDS: u32 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Category {
    Success,
    Notice,
    Danger,
}

impl Category {
    fn as_str(self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::Notice => "notice",
            Category::Danger => "danger",
        }
    }
}

/// Build the flash cookie. Not `HttpOnly`: the frontend consumes it.
pub(crate) fn flash_cookie(
    category: Category,
    message: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let payload = Base64UrlUnpadded::encode_string(
        format!("{}:{}", category.as_str(), message).as_bytes(),
    );
    HeaderValue::from_str(&format!(
        "{FLASH_COOKIE_NAME}={payload}; Path=/; Max-Age={FLASH_MAX_AGE_SECONDS}; SameSite=Lax"
    ))
}

/// Redirect with a flash notification attached.
pub(crate) fn flash_redirect(category: Category, message: &str, target: &str) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = flash_cookie(category, message) {
        headers.insert(SET_COOKIE, cookie);
    }
    (headers, Redirect::to(target)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn flash_cookie_encodes_category_and_message() {
        let cookie = flash_cookie(Category::Success, "Hello octocat, welcome to Ensaluti!")
            .expect("header value");
        let value = cookie.to_str().expect("ascii");
        assert!(value.starts_with("ensaluti_flash="));
        assert!(value.contains("Max-Age=60"));

        let payload = value
            .trim_start_matches("ensaluti_flash=")
            .split(';')
            .next()
            .expect("payload");
        let decoded = Base64UrlUnpadded::decode_vec(payload).expect("base64");
        assert_eq!(
            String::from_utf8(decoded).expect("utf8"),
            "success:Hello octocat, welcome to Ensaluti!"
        );
    }

    #[test]
    fn flash_redirect_sets_cookie_and_location() {
        let response = flash_redirect(Category::Notice, "You have been signed out.", "/welcome/");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok()),
            Some("/welcome/")
        );
        assert!(response.headers().contains_key(SET_COOKIE));
    }
}
