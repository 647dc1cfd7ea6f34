use crate::{
    api::handlers::{auth, health, root, users},
    identity::{write_behind, PgUserStore, UserStore},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod handlers;

/// Build the API router. State (config, store, write-behind queue) is
/// attached by the caller as extensions.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(root::welcome))
        .route("/welcome/", get(root::welcome))
        .route("/health", get(health::health))
        .route("/signin/", get(auth::signin::signin))
        .route("/login/", get(auth::signin::signin))
        .route("/signin/:provider/", get(auth::signin::signin_provider))
        .route(
            "/_s/callback/:provider/authorized/",
            get(auth::callback::authorized),
        )
        .route("/signout/", get(auth::signin::signout))
        .route("/user/me/", get(users::me))
        .route("/admin/users/", get(users::list_users))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, auth_config: auth::AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));

    // Background worker drains deferred user-record writes; the queue handle
    // is dropped after serve returns so the worker can finish and exit.
    let (queue, worker) = write_behind::spawn(store.clone());

    let auth_state = Arc::new(auth::AuthState::new(auth_config)?);

    let app = router().layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(auth_state))
            .layer(Extension(store))
            .layer(Extension(queue.clone())),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    // Drain barrier: close the queue, then wait for the worker to flush.
    drop(queue);
    let _ = worker.await;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
