//! Session management for DiscoveryAI.
//!
//! This crate provides:
//! - A session store with an in-memory user directory and simulated latency
//! - Durable session mirroring through pluggable storage backends
//! - Ordered auth state change subscriptions
//! - A view-layer context with `{ user, loading }` snapshots and access checks

mod context;
mod error;
mod guard;
mod storage;
mod store;
mod subscribers;

pub use context::*;
pub use error::*;
pub use guard::*;
pub use storage::*;
pub use store::*;
pub use subscribers::*;
