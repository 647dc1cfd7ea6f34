//! Session principal resolution and guard wrappers.
//!
//! The principal is re-derived from the session cookie on every request; it
//! is never process-global state. A missing cookie, an expired session, a
//! store failure, or a vanished user record all resolve to the anonymous
//! principal — the reverse mapping fails closed.

use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use tracing::error;

use crate::identity::{UserRecord, UserStore};

use super::guard::{self, Denial, Gate};
use super::redirect::signin_url;
use super::session::{extract_session_token, hash_session_token};

/// Authenticated identity context attached to a request.
#[derive(Clone, Debug)]
pub struct Principal {
    /// 0 is the anonymous sentinel; real user ids start at 1.
    pub id: i64,
    pub name: String,
    pub admin: bool,
    pub active: bool,
    pub user: Option<UserRecord>,
}

impl Principal {
    /// The well-known "no session" principal.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: 0,
            name: "Anonymous".to_string(),
            admin: false,
            active: false,
            user: None,
        }
    }

    #[must_use]
    pub fn from_user(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            admin: user.admin,
            active: user.active,
            user: Some(user),
        }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.id == 0
    }
}

/// Resolve the request's session cookie into a principal.
pub(crate) async fn current_principal(headers: &HeaderMap, store: &dyn UserStore) -> Principal {
    let Some(token) = extract_session_token(headers) else {
        return Principal::anonymous();
    };
    match store.lookup_session(&hash_session_token(&token)).await {
        Ok(Some(user)) => Principal::from_user(user),
        Ok(None) => Principal::anonymous(),
        Err(err) => {
            error!("failed to resolve session, treating as anonymous: {err:#}");
            Principal::anonymous()
        }
    }
}

/// Gate a handler on an active session.
pub(crate) async fn require_session(
    headers: &HeaderMap,
    uri: &Uri,
    store: &dyn UserStore,
) -> Result<Principal, Response> {
    let principal = current_principal(headers, store).await;
    match guard::require_session(&principal, &path_and_query(uri)) {
        Gate::Allow => Ok(principal),
        Gate::Deny(denial) => Err(deny_response(denial)),
    }
}

/// Gate a handler on an active session with the admin role.
pub(crate) async fn require_admin(
    headers: &HeaderMap,
    uri: &Uri,
    store: &dyn UserStore,
) -> Result<Principal, Response> {
    let principal = current_principal(headers, store).await;
    match guard::require_admin(&principal, &path_and_query(uri)) {
        Gate::Allow => Ok(principal),
        Gate::Deny(denial) => Err(deny_response(denial)),
    }
}

fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string())
}

fn deny_response(denial: Denial) -> Response {
    match denial {
        Denial::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        Denial::Forbidden => StatusCode::FORBIDDEN.into_response(),
        Denial::RedirectToSignin(current_url) => {
            Redirect::to(&signin_url(&current_url)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryUserStore, NewUser};
    use anyhow::Result;
    use axum::http::HeaderValue;

    async fn store_with_session(admin: bool) -> Result<(MemoryUserStore, String)> {
        let store = MemoryUserStore::new();
        let user = store
            .create_user(NewUser {
                name: "octocat".to_string(),
                email: String::new(),
                username: "octocat".to_string(),
                auth_ids: vec!["github_1".to_string()],
                admin,
            })
            .await?;
        let token = "test-token".to_string();
        store
            .insert_session(user.id, &hash_session_token(&token), 3600)
            .await?;
        Ok((store, token))
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("ensaluti_session={token}");
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&value).expect("header"),
        );
        headers
    }

    #[test]
    fn anonymous_is_the_id_zero_singleton() {
        let anonymous = Principal::anonymous();
        assert_eq!(anonymous.id, 0);
        assert_eq!(anonymous.name, "Anonymous");
        assert!(!anonymous.admin);
        assert!(anonymous.user.is_none());
        assert!(anonymous.is_anonymous());
    }

    #[tokio::test]
    async fn cookie_resolves_to_principal() -> Result<()> {
        let (store, token) = store_with_session(false).await?;
        let principal = current_principal(&cookie_headers(&token), &store).await;
        assert!(!principal.is_anonymous());
        assert_eq!(principal.name, "octocat");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_token_fails_closed() -> Result<()> {
        let (store, _) = store_with_session(false).await?;
        let principal = current_principal(&cookie_headers("forged"), &store).await;
        assert!(principal.is_anonymous());
        Ok(())
    }

    #[tokio::test]
    async fn require_session_redirects_browsers() -> Result<()> {
        let store = MemoryUserStore::new();
        let uri: Uri = "/dashboard?tab=1".parse()?;
        let denied = require_session(&HeaderMap::new(), &uri, &store)
            .await
            .expect_err("must deny");
        assert_eq!(denied.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            denied.headers().get("location").and_then(|v| v.to_str().ok()),
            Some("/signin/?next=%2Fdashboard%3Ftab%3D1")
        );
        Ok(())
    }

    #[tokio::test]
    async fn require_session_401s_internal_namespace() -> Result<()> {
        let store = MemoryUserStore::new();
        let uri: Uri = "/_s/callback/x".parse()?;
        let denied = require_session(&HeaderMap::new(), &uri, &store)
            .await
            .expect_err("must deny");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn require_admin_distinguishes_roles() -> Result<()> {
        let (store, token) = store_with_session(false).await?;
        let uri: Uri = "/admin/users/".parse()?;
        let denied = require_admin(&cookie_headers(&token), &uri, &store)
            .await
            .expect_err("must deny");
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let (store, token) = store_with_session(true).await?;
        let principal = require_admin(&cookie_headers(&token), &uri, &store)
            .await
            .expect("admin allowed");
        assert!(principal.admin);
        Ok(())
    }
}
