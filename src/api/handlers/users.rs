//! Authenticated self-service and admin endpoints.

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::identity::{UserRecord, UserStore};

use super::auth::principal::{require_admin, require_session};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub created_at: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub auth_ids: Vec<String>,
    pub active: bool,
    pub admin: bool,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            created_at: user.created_at,
            name: user.name,
            email: user.email,
            username: user.username,
            auth_ids: user.auth_ids,
            active: user.active,
            admin: user.admin,
        }
    }
}

#[utoipa::path(
    get,
    path = "/user/me/",
    responses(
        (status = 200, description = "The signed-in user's record", body = UserResponse),
        (status = 303, description = "Anonymous browser, redirect to sign-in")
    ),
    tag = "users"
)]
pub async fn me(
    headers: HeaderMap,
    uri: Uri,
    Extension(store): Extension<Arc<dyn UserStore>>,
) -> Response {
    let principal = match require_session(&headers, &uri, store.as_ref()).await {
        Ok(principal) => principal,
        Err(denied) => return denied,
    };

    match principal.user {
        Some(user) => Json(UserResponse::from(user)).into_response(),
        // A live session always carries its record; treat the gap as a bug.
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/admin/users/",
    responses(
        (status = 200, description = "All user records", body = [UserResponse]),
        (status = 303, description = "Anonymous browser, redirect to sign-in"),
        (status = 403, description = "Signed in but not an admin")
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    uri: Uri,
    Extension(store): Extension<Arc<dyn UserStore>>,
) -> Response {
    if let Err(denied) = require_admin(&headers, &uri, store.as_ref()).await {
        return denied;
    }

    match store.list_users().await {
        Ok(users) => {
            let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
            Json(users).into_response()
        }
        Err(err) => {
            error!("failed to list users: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::session::hash_session_token;
    use crate::identity::{MemoryUserStore, NewUser};
    use anyhow::Result;
    use axum::http::header::COOKIE;
    use axum::http::HeaderValue;
    use http_body_util::BodyExt;

    async fn signed_in_store(admin: bool) -> Result<(Arc<dyn UserStore>, HeaderMap)> {
        let store = MemoryUserStore::new();
        let user = store
            .create_user(NewUser {
                name: "Mona Lisa".to_string(),
                email: "mona@example.com".to_string(),
                username: "mona".to_string(),
                auth_ids: vec!["github_42".to_string()],
                admin,
            })
            .await?;
        store
            .insert_session(user.id, &hash_session_token("token"), 3600)
            .await?;

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("ensaluti_session=token"));
        Ok((Arc::new(store), headers))
    }

    #[tokio::test]
    async fn me_returns_the_signed_in_record() -> Result<()> {
        let (store, headers) = signed_in_store(false).await?;
        let uri: Uri = "/user/me/".parse()?;

        let response = me(headers, uri, Extension(store)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await?.to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["username"], "mona");
        assert_eq!(body["auth_ids"][0], "github_42");
        Ok(())
    }

    #[tokio::test]
    async fn me_redirects_anonymous_browsers() -> Result<()> {
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let uri: Uri = "/user/me/".parse()?;

        let response = me(HeaderMap::new(), uri, Extension(store)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok()),
            Some("/signin/?next=%2Fuser%2Fme%2F")
        );
        Ok(())
    }

    #[tokio::test]
    async fn list_users_requires_the_admin_role() -> Result<()> {
        let (store, headers) = signed_in_store(false).await?;
        let uri: Uri = "/admin/users/".parse()?;

        let response = list_users(headers, uri, Extension(store)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn list_users_returns_every_record_to_admins() -> Result<()> {
        let (store, headers) = signed_in_store(true).await?;
        let uri: Uri = "/admin/users/".parse()?;

        let response = list_users(headers, uri, Extension(store)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await?.to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["admin"], true);
        Ok(())
    }
}
