//! Provider payload normalization.
//!
//! A [`Profile`] lives only for the duration of one callback; it is never
//! persisted. Each provider returns a slightly different JSON shape, so the
//! fallback rules live here and nowhere else.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use super::Provider;

/// Verified identity payload produced by a provider adapter.
#[derive(Clone, Debug)]
pub struct Profile {
    /// Provider-scoped account id, unqualified.
    pub external_id: String,
    /// Display name; `None` when the provider gave nothing usable.
    pub name: Option<String>,
    /// Handle/username hint used for local username allocation.
    pub handle: String,
    /// May be absent; stored as an empty string, never NULL.
    pub email: Option<String>,
    /// Only the platform-managed provider ever asserts this.
    pub provider_admin: bool,
}

/// Normalize a raw profile payload from an OAuth2 provider.
///
/// # Errors
/// Returns an error when the payload is missing the fields that identify the
/// account; such callbacks are protocol errors and never touch the store.
pub fn normalize(provider: Provider, payload: &Value) -> Result<Profile> {
    match provider {
        Provider::Github => {
            let external_id = id_field(payload, "id").context("github profile missing id")?;
            let handle =
                string_field(payload, "login").context("github profile missing login")?;
            Ok(Profile {
                external_id,
                name: string_field(payload, "name"),
                handle,
                email: string_field(payload, "email"),
                provider_admin: false,
            })
        }
        Provider::Gitlab => {
            let external_id = id_field(payload, "id").context("gitlab profile missing id")?;
            let handle =
                string_field(payload, "username").context("gitlab profile missing username")?;
            Ok(Profile {
                external_id,
                name: string_field(payload, "name"),
                handle,
                email: string_field(payload, "email"),
                provider_admin: false,
            })
        }
        Provider::Bitbucket => {
            let handle = string_field(payload, "username")
                .or_else(|| string_field(payload, "nickname"))
                .context("bitbucket profile missing username")?;
            let external_id =
                string_field(payload, "account_id").unwrap_or_else(|| handle.clone());
            Ok(Profile {
                external_id,
                name: string_field(payload, "display_name"),
                handle,
                email: None,
                provider_admin: false,
            })
        }
        Provider::Facebook => {
            let external_id = id_field(payload, "id").context("facebook profile missing id")?;
            // Facebook dropped public usernames; fall back to the numeric id.
            let handle =
                string_field(payload, "username").unwrap_or_else(|| external_id.clone());
            Ok(Profile {
                external_id,
                name: string_field(payload, "name"),
                handle,
                email: string_field(payload, "email"),
                provider_admin: false,
            })
        }
        Provider::Vk => {
            let entry = payload
                .get("response")
                .and_then(Value::as_array)
                .and_then(|entries| entries.first())
                .context("vk profile missing response entry")?;
            let external_id = id_field(entry, "id").context("vk profile missing id")?;
            let name = match (
                string_field(entry, "first_name"),
                string_field(entry, "last_name"),
            ) {
                (Some(first), Some(last)) => Some(format!("{first} {last}")),
                (Some(single), None) | (None, Some(single)) => Some(single),
                (None, None) => None,
            };
            let handle =
                string_field(entry, "screen_name").unwrap_or_else(|| external_id.clone());
            Ok(Profile {
                external_id,
                name,
                handle,
                email: None,
                provider_admin: false,
            })
        }
        Provider::Federated => {
            bail!("federated profiles are asserted via trusted headers, not JSON payloads")
        }
    }
}

/// Non-empty string field, `None` otherwise.
fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Account ids arrive as either JSON numbers or strings.
fn id_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::Number(number) => Some(number.to_string()),
        Value::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn github_falls_back_to_login_when_name_missing() -> Result<()> {
        let payload = json!({"id": 12345, "login": "octocat", "name": null, "email": null});
        let profile = normalize(Provider::Github, &payload)?;
        assert_eq!(profile.external_id, "12345");
        assert_eq!(profile.name, None);
        assert_eq!(profile.handle, "octocat");
        assert_eq!(profile.email, None);
        assert!(!profile.provider_admin);
        Ok(())
    }

    #[test]
    fn github_keeps_name_and_email_when_present() -> Result<()> {
        let payload = json!({
            "id": 1,
            "login": "monalisa",
            "name": "Mona Lisa",
            "email": "mona@example.com"
        });
        let profile = normalize(Provider::Github, &payload)?;
        assert_eq!(profile.name.as_deref(), Some("Mona Lisa"));
        assert_eq!(profile.email.as_deref(), Some("mona@example.com"));
        Ok(())
    }

    #[test]
    fn github_without_login_is_a_protocol_error() {
        let payload = json!({"id": 12345});
        assert!(normalize(Provider::Github, &payload).is_err());
    }

    #[test]
    fn facebook_handle_falls_back_to_id() -> Result<()> {
        let payload = json!({"id": "998877", "name": "Ada Lovelace"});
        let profile = normalize(Provider::Facebook, &payload)?;
        assert_eq!(profile.external_id, "998877");
        assert_eq!(profile.handle, "998877");
        assert_eq!(profile.name.as_deref(), Some("Ada Lovelace"));
        Ok(())
    }

    #[test]
    fn bitbucket_assembles_display_name() -> Result<()> {
        let payload = json!({
            "username": "brackets",
            "account_id": "557058:abc",
            "display_name": "Bra Ckets"
        });
        let profile = normalize(Provider::Bitbucket, &payload)?;
        assert_eq!(profile.external_id, "557058:abc");
        assert_eq!(profile.handle, "brackets");
        assert_eq!(profile.name.as_deref(), Some("Bra Ckets"));
        Ok(())
    }

    #[test]
    fn vk_joins_first_and_last_name() -> Result<()> {
        let payload = json!({
            "response": [{"id": 42, "first_name": "Lev", "last_name": "Tolstoj", "screen_name": "ltolstoj"}]
        });
        let profile = normalize(Provider::Vk, &payload)?;
        assert_eq!(profile.external_id, "42");
        assert_eq!(profile.name.as_deref(), Some("Lev Tolstoj"));
        assert_eq!(profile.handle, "ltolstoj");
        Ok(())
    }

    #[test]
    fn vk_empty_response_is_a_protocol_error() {
        let payload = json!({"response": []});
        assert!(normalize(Provider::Vk, &payload).is_err());
    }

    #[test]
    fn federated_rejects_json_normalization() {
        assert!(normalize(Provider::Federated, &json!({})).is_err());
    }
}
