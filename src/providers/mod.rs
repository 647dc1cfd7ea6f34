//! Identity providers and profile normalization.
//!
//! One `Provider` enum drives a single shared sign-in flow: each variant
//! supplies its OAuth2 endpoints (`oauth`) or trusted-header contract
//! (`federated`) plus one normalization rule turning the raw payload into a
//! [`Profile`]. Adding a provider means adding an enum variant, its
//! endpoints, and a `normalize` arm.

use std::fmt;

pub mod federated;
pub mod oauth;
pub mod profile;

pub use profile::Profile;

/// A configured identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Platform-managed identity asserted by the fronting gateway.
    Federated,
    Github,
    Gitlab,
    Bitbucket,
    Facebook,
    Vk,
}

impl Provider {
    /// All providers, in the order they are listed on the sign-in page.
    pub const ALL: [Provider; 6] = [
        Provider::Federated,
        Provider::Github,
        Provider::Gitlab,
        Provider::Bitbucket,
        Provider::Facebook,
        Provider::Vk,
    ];

    /// Providers that use the OAuth2 authorization-code flow.
    pub const OAUTH: [Provider; 5] = [
        Provider::Github,
        Provider::Gitlab,
        Provider::Bitbucket,
        Provider::Facebook,
        Provider::Vk,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Federated => "federated",
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Bitbucket => "bitbucket",
            Provider::Facebook => "facebook",
            Provider::Vk => "vk",
        }
    }

    /// Parse a provider from its URL segment.
    #[must_use]
    pub fn parse(name: &str) -> Option<Provider> {
        Provider::ALL
            .into_iter()
            .find(|provider| provider.as_str() == name)
    }

    /// Build the provider-qualified external identifier stored in
    /// `auth_ids`. Qualification prevents collisions between numerically
    /// identical ids issued by different providers.
    #[must_use]
    pub fn qualify(&self, external_id: &str) -> String {
        format!("{}_{}", self.as_str(), external_id)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
