//! Core entity definitions for DiscoveryAI.
//!
//! This crate defines the data types shared by the session store and its
//! consumers: user records, partial profile updates and subscription tiers.

mod subscription;
mod user;

pub use subscription::*;
pub use user::*;
