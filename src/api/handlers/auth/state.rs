//! Sign-in configuration and shared state.

use anyhow::{Context, Result};
use reqwest::Client;
use secrecy::SecretString;
use std::collections::HashMap;

use crate::providers::Provider;
use crate::APP_USER_AGENT;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_FEDERATED_LOGIN_URL: &str = "/_p/login/";
const DEFAULT_BRAND_NAME: &str = "Ensaluti";

/// Client id/secret pair for one OAuth2 provider.
#[derive(Clone, Debug)]
pub struct OAuthCredentials {
    client_id: String,
    client_secret: SecretString,
}

impl OAuthCredentials {
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }
}

/// Read-only sign-in configuration, loaded once at process start.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    brand_name: String,
    session_ttl_seconds: i64,
    federated_login_url: String,
    credentials: HashMap<Provider, OAuthCredentials>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            brand_name: DEFAULT_BRAND_NAME.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            federated_login_url: DEFAULT_FEDERATED_LOGIN_URL.to_string(),
            credentials: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_brand_name(mut self, brand_name: String) -> Self {
        self.brand_name = brand_name;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_federated_login_url(mut self, url: String) -> Self {
        self.federated_login_url = url;
        self
    }

    #[must_use]
    pub fn with_oauth_credentials(
        mut self,
        provider: Provider,
        credentials: OAuthCredentials,
    ) -> Self {
        self.credentials.insert(provider, credentials);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn brand_name(&self) -> &str {
        &self.brand_name
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn federated_login_url(&self) -> &str {
        &self.federated_login_url
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    pub(crate) fn credentials(&self, provider: Provider) -> Option<&OAuthCredentials> {
        self.credentials.get(&provider)
    }

    /// The federated provider plus every OAuth provider with credentials, in
    /// sign-in page order.
    pub(crate) fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|provider| {
                *provider == Provider::Federated || self.credentials.contains_key(provider)
            })
            .collect()
    }

    /// Absolute callback URL registered with the provider.
    pub(crate) fn callback_url(&self, provider: Provider) -> String {
        format!("{}/_s/callback/{provider}/authorized/", self.base_url)
    }
}

/// Per-process sign-in state shared across requests.
pub struct AuthState {
    config: AuthConfig,
    http: Client,
}

impl AuthState {
    /// # Errors
    /// Returns an error when the outbound HTTP client cannot be built.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("failed to build provider HTTP client")?;
        Ok(Self { config, http })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }
}
