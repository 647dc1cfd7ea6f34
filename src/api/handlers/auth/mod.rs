//! Federated sign-in: provider redirects, callbacks, sessions, and the
//! request guards the rest of the API builds on.

pub mod callback;
pub mod flash;
pub mod guard;
pub mod principal;
pub mod redirect;
pub mod session;
pub mod signin;
pub mod state;

pub use principal::Principal;
pub use state::{AuthConfig, AuthState, OAuthCredentials};
