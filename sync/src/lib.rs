//! Offline-first synchronization engine for the fuelog mileage tracker.
//!
//! The local store ([`fuelog_core::db::Database`]) is the synchronous source
//! of truth; the remote store is reached best-effort over the network. The
//! [`context::EntryContext`] mediates every mutation local-first and keeps a
//! reactive working set for the UI, while [`engine`] reconciles the two
//! stores whenever connectivity or the signed-in identity changes.

pub mod auth;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod engine;
pub mod remote;

#[cfg(test)]
pub(crate) mod testutil;
