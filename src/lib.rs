//! # Ensaluti (Federated Sign-In)
//!
//! `ensaluti` authenticates visitors against third-party identity providers
//! (OAuth2) or a platform-managed identity service, maps each external
//! account to exactly one local user record, and establishes a cookie-bound
//! session that downstream handlers gate on.
//!
//! ## Identity Resolution
//!
//! Every provider callback is normalized into a `Profile` and resolved as an
//! upsert keyed on a provider-qualified external identifier such as
//! `github_12345`. Resolution never keys on email or display name, so a
//! spoofed email from a less-trusted provider cannot take over an account.
//!
//! - **Usernames:** Allocated from the provider handle, normalized to a
//!   lowercase dotted form, with numeric suffixes on collision. The probe
//!   loop is not atomic with record creation; two concurrent sign-ins with
//!   colliding handles can race. See `identity::username`.
//! - **Admin Promotion:** The platform-managed provider can promote a user
//!   to admin. The promotion is monotonic; later sign-ins never demote.
//!
//! ## Access Control
//!
//! Requests are gated by pure decision functions over (principal, path):
//! unauthenticated requests under the internal `/_s/` namespace get `401`,
//! elsewhere they are redirected to the sign-in page, and authenticated but
//! non-admin requests to admin surfaces get `403`.

pub mod api;
pub mod cli;
pub mod identity;
pub mod providers;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
