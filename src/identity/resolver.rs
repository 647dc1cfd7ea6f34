//! Identity resolution: external profile to local user record.
//!
//! Resolution is an idempotent upsert keyed on the provider-qualified
//! external identifier, never on email or display name; a spoofed email from
//! a less-trusted provider cannot attach to an existing account.

use anyhow::Result;

use crate::providers::{Profile, Provider};

use super::store::{NewUser, UserStore};
use super::username;
use super::UserRecord;

/// Outcome of resolving a verified profile.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub user: UserRecord,
    /// The record was mutated in memory (admin promotion) and still needs to
    /// be persisted; the session establisher hands it to the write-behind
    /// queue so the redirect never waits on the write.
    pub pending_write: bool,
}

/// Map a verified external profile to exactly one local user record,
/// creating one on first sign-in.
pub async fn resolve(
    store: &dyn UserStore,
    provider: Provider,
    profile: &Profile,
) -> Result<Resolution> {
    let auth_id = provider.qualify(&profile.external_id);

    if let Some(mut user) = store.find_by_auth_id(&auth_id).await? {
        // One-way promotion, asserted only by the platform-managed provider.
        if provider == Provider::Federated && profile.provider_admin && !user.admin {
            user.admin = true;
            return Ok(Resolution {
                user,
                pending_write: true,
            });
        }
        return Ok(Resolution {
            user,
            pending_write: false,
        });
    }

    let handle = if profile.handle.is_empty() {
        profile.name.clone().unwrap_or_default()
    } else {
        profile.handle.clone()
    };
    let username = username::allocate(store, &handle).await?;
    let name = profile
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| profile.handle.clone());
    let user = store
        .create_user(NewUser {
            name,
            email: profile.email.clone().unwrap_or_default().to_lowercase(),
            username,
            auth_ids: vec![auth_id],
            admin: provider == Provider::Federated && profile.provider_admin,
        })
        .await?;

    Ok(Resolution {
        user,
        pending_write: false,
    })
}
