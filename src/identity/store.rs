//! Keyed storage of user records and sessions.
//!
//! [`UserStore`] is the interface boundary to the durable store. The
//! production implementation is [`PgUserStore`] on sqlx/PostgreSQL;
//! [`MemoryUserStore`] backs tests and local development.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::Instrument;

/// The durable identity entity.
///
/// `username` is unique across all records, and no two records may share an
/// `auth_ids` entry. Records are created once per distinct external identity
/// and only ever updated afterwards, never deleted by this subsystem.
#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    /// Never 0; 0 is the anonymous principal sentinel.
    pub id: i64,
    pub created_at: String,
    pub name: String,
    /// Empty string when the provider gave no email, never NULL.
    pub email: String,
    pub username: String,
    /// Provider-qualified external identifiers, e.g. `github_12345`.
    pub auth_ids: Vec<String>,
    pub active: bool,
    pub admin: bool,
}

/// Fields for creating a user record on first sign-in.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub username: String,
    pub auth_ids: Vec<String>,
    pub admin: bool,
}

/// Keyed record store for users and their sessions.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_auth_id(&self, auth_id: &str) -> Result<Option<UserRecord>>;
    async fn username_taken(&self, username: &str) -> Result<bool>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord>;
    async fn update_user(&self, user: &UserRecord) -> Result<()>;
    async fn list_users(&self) -> Result<Vec<UserRecord>>;
    async fn insert_session(
        &self,
        user_id: i64,
        session_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()>;
    /// Resolve a session hash to its user. Expired sessions and inactive or
    /// deleted users resolve to `None`; the caller treats that as anonymous.
    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<UserRecord>>;
    async fn delete_session(&self, session_hash: &[u8]) -> Result<()>;
}

/// PostgreSQL-backed store.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, created_at::text AS created_at, name, email, username, auth_ids, active, admin";

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        created_at: row.get("created_at"),
        name: row.get("name"),
        email: row.get("email"),
        username: row.get("username"),
        auth_ids: row.get("auth_ids"),
        active: row.get("active"),
        admin: row.get("admin"),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_auth_id(&self, auth_id: &str) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE $1 = ANY(auth_ids) LIMIT 1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(auth_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by auth id")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn username_taken(&self, username: &str) -> Result<bool> {
        let query = "SELECT 1 FROM users WHERE username = $1 LIMIT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to probe username")?;
        Ok(row.is_some())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord> {
        let query = format!(
            r"
            INSERT INTO users (name, email, username, auth_ids, admin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(&new_user.username)
            .bind(&new_user.auth_ids)
            .bind(new_user.admin)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert user")?;
        Ok(user_from_row(&row))
    }

    async fn update_user(&self, user: &UserRecord) -> Result<()> {
        let query = r"
            UPDATE users
            SET name = $2, email = $3, active = $4, admin = $5, updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.active)
            .bind(user.admin)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update user")?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list users")?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn insert_session(
        &self,
        user_id: i64,
        session_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()> {
        let query = r"
            INSERT INTO user_sessions (user_id, session_hash, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(session_hash)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<UserRecord>> {
        // Only active users with unexpired sessions resolve; everything else
        // fails closed to anonymous.
        let query = format!(
            r"
            SELECT {USER_COLUMNS}
            FROM user_sessions
            JOIN users ON users.id = user_sessions.user_id
            WHERE user_sessions.session_hash = $1
              AND user_sessions.expires_at > NOW()
              AND users.active
            LIMIT 1
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(session_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        if row.is_none() {
            return Ok(None);
        }

        // Audit touch; does not extend the session TTL.
        let query = "UPDATE user_sessions SET last_seen_at = NOW() WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update session last_seen_at")?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()> {
        // Sign-out is idempotent; zero deleted rows is fine.
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}

/// In-memory store for tests and local development.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    users: Vec<UserRecord>,
    sessions: HashMap<Vec<u8>, MemorySession>,
}

struct MemorySession {
    user_id: i64,
    expires_at: Instant,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored user records; test helper.
    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_auth_id(&self, auth_id: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|user| user.auth_ids.iter().any(|id| id == auth_id))
            .cloned())
    }

    async fn username_taken(&self, username: &str) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().any(|user| user.username == username))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord> {
        let mut inner = self.inner.lock().await;
        if inner
            .users
            .iter()
            .any(|user| user.username == new_user.username)
        {
            bail!("username {} already taken", new_user.username);
        }
        if inner.users.iter().any(|user| {
            user.auth_ids
                .iter()
                .any(|id| new_user.auth_ids.contains(id))
        }) {
            bail!("auth id already mapped to another user");
        }
        inner.next_id += 1;
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();
        let user = UserRecord {
            id: inner.next_id,
            created_at,
            name: new_user.name,
            email: new_user.email,
            username: new_user.username,
            auth_ids: new_user.auth_ids,
            active: true,
            admin: new_user.admin,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: &UserRecord) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.users.iter_mut().find(|entry| entry.id == user.id) {
            Some(entry) => {
                *entry = user.clone();
                Ok(())
            }
            None => bail!("no user with id {}", user.id),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.clone())
    }

    async fn insert_session(
        &self,
        user_id: i64,
        session_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let ttl = Duration::from_secs(u64::try_from(ttl_seconds.max(0)).unwrap_or_default());
        inner.sessions.insert(
            session_hash.to_vec(),
            MemorySession {
                user_id,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<UserRecord>> {
        let inner = self.inner.lock().await;
        let Some(session) = inner.sessions.get(session_hash) else {
            return Ok(None);
        };
        if session.expires_at <= Instant::now() {
            return Ok(None);
        }
        Ok(inner
            .users
            .iter()
            .find(|user| user.id == session.user_id && user.active)
            .cloned())
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(session_hash);
        Ok(())
    }
}
