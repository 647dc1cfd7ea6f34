//! Deferred persistence of user record mutations.
//!
//! Post-login writes (the admin promotion) must not delay the redirect
//! response, but the process must not exit before they land. Handlers
//! enqueue; a single worker persists and logs failures; the server drops its
//! queue handle after the listener stops and awaits the worker, which drains
//! the channel before exiting.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use super::store::{UserRecord, UserStore};

/// Handle for enqueuing fire-and-forget user record updates.
#[derive(Clone)]
pub struct WriteBehindQueue {
    tx: mpsc::UnboundedSender<UserRecord>,
}

impl WriteBehindQueue {
    pub fn enqueue(&self, user: UserRecord) {
        if self.tx.send(user).is_err() {
            // Only possible during shutdown, after the worker stopped.
            error!("write-behind queue closed; dropping user update");
        }
    }
}

/// Spawn the persistence worker. The returned handle completes once every
/// queue sender is dropped and the backlog is drained.
pub fn spawn(store: Arc<dyn UserStore>) -> (WriteBehindQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<UserRecord>();
    let worker = tokio::spawn(async move {
        while let Some(user) = rx.recv().await {
            if let Err(err) = store.update_user(&user).await {
                // Persistence failures are logged, never surfaced to the
                // already-redirected client.
                error!(user_id = user.id, "deferred user update failed: {err:#}");
            }
        }
    });
    (WriteBehindQueue { tx }, worker)
}
