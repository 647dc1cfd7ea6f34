//! Landing page. Works for anonymous visitors and signed-in users alike;
//! the principal is derived fail-closed, never required.

use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::identity::UserStore;

use super::auth::principal::current_principal;
use super::auth::state::AuthState;

#[derive(Debug, Serialize, ToSchema)]
pub struct WelcomeResponse {
    pub brand: String,
    pub signed_in: bool,
    pub name: String,
    pub username: Option<String>,
    pub admin: bool,
}

#[utoipa::path(
    get,
    path = "/welcome/",
    responses(
        (status = 200, description = "Landing page for visitors and users", body = WelcomeResponse)
    ),
    tag = "root"
)]
pub async fn welcome(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    Extension(store): Extension<Arc<dyn UserStore>>,
) -> impl IntoResponse {
    let principal = current_principal(&headers, store.as_ref()).await;

    Json(WelcomeResponse {
        brand: state.config().brand_name().to_string(),
        signed_in: !principal.is_anonymous(),
        username: principal
            .user
            .as_ref()
            .map(|user| user.username.clone()),
        name: principal.name,
        admin: principal.admin,
    })
}
