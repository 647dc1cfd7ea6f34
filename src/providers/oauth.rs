//! OAuth2 authorization-code plumbing shared by all OAuth providers.
//!
//! The handshake itself is the provider's responsibility; this module only
//! builds the authorize redirect, exchanges the callback code for an access
//! token, and fetches the raw profile payload for [`super::profile`] to
//! normalize.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{header::ACCEPT, Client};
use secrecy::ExposeSecret;
use serde_json::Value;
use url::Url;

use crate::api::handlers::auth::OAuthCredentials;

use super::Provider;

/// Fixed endpoint set for one OAuth2 provider.
pub(crate) struct Endpoints {
    pub(crate) authorize_url: &'static str,
    pub(crate) token_url: &'static str,
    pub(crate) profile_url: &'static str,
    pub(crate) scope: &'static str,
}

pub(crate) fn endpoints(provider: Provider) -> Option<Endpoints> {
    match provider {
        Provider::Github => Some(Endpoints {
            authorize_url: "https://github.com/login/oauth/authorize",
            token_url: "https://github.com/login/oauth/access_token",
            profile_url: "https://api.github.com/user",
            scope: "user:email",
        }),
        Provider::Gitlab => Some(Endpoints {
            authorize_url: "https://gitlab.com/oauth/authorize",
            token_url: "https://gitlab.com/oauth/token",
            profile_url: "https://gitlab.com/api/v4/user",
            scope: "read_user",
        }),
        Provider::Bitbucket => Some(Endpoints {
            authorize_url: "https://bitbucket.org/site/oauth2/authorize",
            token_url: "https://bitbucket.org/site/oauth2/access_token",
            profile_url: "https://api.bitbucket.org/2.0/user",
            scope: "account",
        }),
        Provider::Facebook => Some(Endpoints {
            authorize_url: "https://www.facebook.com/dialog/oauth",
            token_url: "https://graph.facebook.com/oauth/access_token",
            profile_url: "https://graph.facebook.com/me",
            scope: "email",
        }),
        Provider::Vk => Some(Endpoints {
            authorize_url: "https://oauth.vk.com/authorize",
            token_url: "https://oauth.vk.com/access_token",
            profile_url: "https://api.vk.com/method/users.get",
            scope: "",
        }),
        Provider::Federated => None,
    }
}

/// Build the provider authorize URL the browser is redirected to.
///
/// The sanitized next-URL hint rides in `state` and comes back on the
/// callback.
pub(crate) fn authorize_url(
    provider: Provider,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<String> {
    let endpoints = endpoints(provider)
        .ok_or_else(|| anyhow!("{provider} does not use the OAuth2 flow"))?;
    let mut url = Url::parse(endpoints.authorize_url)
        .with_context(|| format!("invalid authorize URL for {provider}"))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("response_type", "code");
        if !endpoints.scope.is_empty() {
            query.append_pair("scope", endpoints.scope);
        }
        query.append_pair("state", state);
    }
    Ok(url.into())
}

/// Exchange the callback code for an access token.
pub(crate) async fn exchange_code(
    client: &Client,
    provider: Provider,
    credentials: &OAuthCredentials,
    code: &str,
    redirect_uri: &str,
) -> Result<String> {
    let endpoints = endpoints(provider)
        .ok_or_else(|| anyhow!("{provider} does not use the OAuth2 flow"))?;
    let params = [
        ("client_id", credentials.client_id()),
        ("client_secret", credentials.client_secret().expose_secret()),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];
    let response = client
        .post(endpoints.token_url)
        // GitHub answers with form-encoding unless JSON is requested.
        .header(ACCEPT, "application/json")
        .form(&params)
        .send()
        .await
        .with_context(|| format!("failed to reach {provider} token endpoint"))?;

    if !response.status().is_success() {
        bail!("{provider} token endpoint returned {}", response.status());
    }

    let payload: Value = response
        .json()
        .await
        .with_context(|| format!("invalid token response from {provider}"))?;
    payload
        .get("access_token")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("{provider} token response missing access_token"))
}

/// Fetch the raw profile payload for the authenticated account.
pub(crate) async fn fetch_profile(
    client: &Client,
    provider: Provider,
    access_token: &str,
) -> Result<Value> {
    let endpoints = endpoints(provider)
        .ok_or_else(|| anyhow!("{provider} does not use the OAuth2 flow"))?;
    let request = match provider {
        // Graph-style APIs take the token as a query parameter.
        Provider::Facebook => client.get(endpoints.profile_url).query(&[
            ("fields", "id,name,email"),
            ("access_token", access_token),
        ]),
        Provider::Vk => client.get(endpoints.profile_url).query(&[
            ("fields", "screen_name"),
            ("v", "5.131"),
            ("access_token", access_token),
        ]),
        _ => client.get(endpoints.profile_url).bearer_auth(access_token),
    };
    let response = request
        .send()
        .await
        .with_context(|| format!("failed to reach {provider} profile endpoint"))?;

    if !response.status().is_success() {
        bail!("{provider} profile endpoint returned {}", response.status());
    }

    response
        .json()
        .await
        .with_context(|| format!("invalid profile response from {provider}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_oauth_provider_has_endpoints() {
        for provider in Provider::OAUTH {
            assert!(endpoints(provider).is_some(), "{provider} has no endpoints");
        }
        assert!(endpoints(Provider::Federated).is_none());
    }

    #[test]
    fn authorize_url_carries_client_redirect_and_state() -> Result<()> {
        let url = authorize_url(
            Provider::Github,
            "client-123",
            "https://app.example.com/_s/callback/github/authorized/",
            "/dashboard",
        )?;
        let parsed = Url::parse(&url)?;
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".into(), "client-123".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "https://app.example.com/_s/callback/github/authorized/".into()
        )));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "user:email".into())));
        assert!(pairs.contains(&("state".into(), "/dashboard".into())));
        Ok(())
    }

    #[test]
    fn authorize_url_skips_empty_scope() -> Result<()> {
        let url = authorize_url(Provider::Vk, "id", "https://cb", "/")?;
        assert!(!url.contains("scope="));
        Ok(())
    }

    #[test]
    fn authorize_url_rejects_federated() {
        assert!(authorize_url(Provider::Federated, "id", "https://cb", "/").is_err());
    }
}
