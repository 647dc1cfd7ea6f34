//! Collision-safe username allocation.
//!
//! Known weak point: the existence probe and the eventual insert are not one
//! transaction. Two concurrent sign-ins whose handles normalize identically
//! can both pass the probe for the same candidate; the store's unique
//! constraint then fails the second insert. A conditional-write transaction
//! keyed on username would close the race if a hard guarantee is ever
//! needed.

use anyhow::{anyhow, Result};

use super::store::UserStore;

/// Probe ceiling; hitting it means the store is misbehaving, not that the
/// namespace is exhausted.
const MAX_PROBES: usize = 1000;

/// Allocate a unique, normalized, URL-safe username from a raw handle.
///
/// The candidate is the normalized handle with separators dotted; suffix
/// probing appends `1`, `2`, ... to the un-dotted normalized base.
pub async fn allocate(store: &dyn UserStore, raw_handle: &str) -> Result<String> {
    let base = normalize(raw_handle);
    let candidate = dotted(&base);
    if !store.username_taken(&candidate).await? {
        return Ok(candidate);
    }
    for n in 1..=MAX_PROBES {
        let candidate = format!("{base}{n}");
        if !store.username_taken(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(anyhow!(
        "username probe limit reached for {base}; store may be unavailable"
    ))
}

/// Portion before any `@`, lowercased. Empty input falls back to `user`.
fn normalize(raw_handle: &str) -> String {
    let base = raw_handle
        .split('@')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

/// Spaces, underscores and hyphens each map to a dot.
fn dotted(base: &str) -> String {
    base.replace([' ', '_', '-'], ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::store::{MemoryUserStore, NewUser};

    async fn occupy(store: &MemoryUserStore, username: &str) {
        store
            .create_user(NewUser {
                name: username.to_string(),
                email: String::new(),
                username: username.to_string(),
                auth_ids: vec![format!("test_{username}")],
                admin: false,
            })
            .await
            .expect("create user");
    }

    #[tokio::test]
    async fn free_candidate_is_returned_dotted() -> Result<()> {
        let store = MemoryUserStore::new();
        assert_eq!(allocate(&store, "John Doe").await?, "john.doe");
        assert_eq!(allocate(&store, "mona_lisa-art").await?, "mona.lisa.art");
        Ok(())
    }

    #[tokio::test]
    async fn email_handles_drop_the_domain() -> Result<()> {
        let store = MemoryUserStore::new();
        assert_eq!(allocate(&store, "Octocat@github.com").await?, "octocat");
        Ok(())
    }

    #[tokio::test]
    async fn colliding_handles_get_numeric_suffixes() -> Result<()> {
        let store = MemoryUserStore::new();
        occupy(&store, "john.doe").await;
        // Suffixes go on the un-dotted base.
        assert_eq!(allocate(&store, "John Doe").await?, "john doe1");

        occupy(&store, "octocat").await;
        occupy(&store, "octocat1").await;
        assert_eq!(allocate(&store, "octocat").await?, "octocat2");
        Ok(())
    }

    #[tokio::test]
    async fn distinct_handles_normalizing_equal_stay_distinct() -> Result<()> {
        // H1 != H2 but both normalize to "jane.roe".
        let store = MemoryUserStore::new();
        let first = allocate(&store, "Jane Roe").await?;
        occupy(&store, &first).await;
        let second = allocate(&store, "jane_roe").await?;
        assert_eq!(first, "jane.roe");
        assert_eq!(second, "jane_roe1");
        assert_ne!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn empty_handle_falls_back() -> Result<()> {
        let store = MemoryUserStore::new();
        assert_eq!(allocate(&store, "").await?, "user");
        assert_eq!(allocate(&store, "@example.com").await?, "user");
        Ok(())
    }
}
