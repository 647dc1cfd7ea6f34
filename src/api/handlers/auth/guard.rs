//! Pure access-control decisions.
//!
//! Both gates are decision functions over (principal, path) with no I/O; the
//! wrappers in [`super::principal`] resolve the session cookie and turn a
//! [`Denial`] into a response. Machine callbacks under the internal `/_s/`
//! namespace get a `401` because a redirect makes no sense there; browser
//! paths are sent to the sign-in page with the current URL as the `next`
//! hint.

use super::principal::Principal;

/// Requests under this prefix are service callbacks, not browser pages.
pub(crate) const INTERNAL_PREFIX: &str = "/_s/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    Allow,
    Deny(Denial),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Denial {
    /// 401; internal namespace, no redirect target makes sense.
    Unauthorized,
    /// 403; session present but lacking the required role.
    Forbidden,
    /// Send the browser to sign-in, returning here afterwards.
    RedirectToSignin(String),
}

/// Allow iff a session is present.
#[must_use]
pub fn require_session(principal: &Principal, path_and_query: &str) -> Gate {
    if !principal.is_anonymous() {
        return Gate::Allow;
    }
    deny_unauthenticated(path_and_query)
}

/// Allow iff a session is present and carries the admin role.
#[must_use]
pub fn require_admin(principal: &Principal, path_and_query: &str) -> Gate {
    if principal.is_anonymous() {
        return deny_unauthenticated(path_and_query);
    }
    if principal.admin {
        Gate::Allow
    } else {
        Gate::Deny(Denial::Forbidden)
    }
}

fn deny_unauthenticated(path_and_query: &str) -> Gate {
    if path_and_query.starts_with(INTERNAL_PREFIX) {
        Gate::Deny(Denial::Unauthorized)
    } else {
        Gate::Deny(Denial::RedirectToSignin(path_and_query.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserRecord;

    fn user(admin: bool) -> Principal {
        Principal::from_user(UserRecord {
            id: 7,
            created_at: "0".to_string(),
            name: "Octo Cat".to_string(),
            email: String::new(),
            username: "octocat".to_string(),
            auth_ids: vec!["github_12345".to_string()],
            active: true,
            admin,
        })
    }

    #[test]
    fn anonymous_on_internal_namespace_gets_401() {
        let anonymous = Principal::anonymous();
        assert_eq!(
            require_session(&anonymous, "/_s/callback/x"),
            Gate::Deny(Denial::Unauthorized)
        );
        assert_eq!(
            require_admin(&anonymous, "/_s/callback/x"),
            Gate::Deny(Denial::Unauthorized)
        );
    }

    #[test]
    fn anonymous_on_browser_path_is_redirected() {
        let anonymous = Principal::anonymous();
        assert_eq!(
            require_session(&anonymous, "/dashboard"),
            Gate::Deny(Denial::RedirectToSignin("/dashboard".to_string()))
        );
        assert_eq!(
            require_admin(&anonymous, "/dashboard?tab=1"),
            Gate::Deny(Denial::RedirectToSignin("/dashboard?tab=1".to_string()))
        );
    }

    #[test]
    fn session_passes_require_session() {
        assert_eq!(require_session(&user(false), "/dashboard"), Gate::Allow);
        assert_eq!(require_session(&user(false), "/_s/callback/x"), Gate::Allow);
    }

    #[test]
    fn non_admin_session_gets_403_from_require_admin() {
        assert_eq!(
            require_admin(&user(false), "/admin/users/"),
            Gate::Deny(Denial::Forbidden)
        );
    }

    #[test]
    fn admin_session_passes_require_admin() {
        assert_eq!(require_admin(&user(true), "/admin/users/"), Gate::Allow);
    }
}
