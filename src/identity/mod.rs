//! Local identity records and the resolution core.
//!
//! The durable store is an external collaborator reached through the
//! [`store::UserStore`] trait; everything with non-trivial invariants
//! (collision-safe username allocation, idempotent external-identity
//! mapping, deferred persistence) lives in this module.

pub mod resolver;
pub mod store;
pub mod username;
pub mod write_behind;

pub use resolver::{resolve, Resolution};
pub use store::{MemoryUserStore, NewUser, PgUserStore, UserRecord, UserStore};
pub use write_behind::WriteBehindQueue;
