//! Typed error hierarchy for Atelier.
//!
//! Two top-level enums cover the two subsystems:
//! - `StoreError` — factory store failures, classified at the store boundary
//! - `TransportError` — channel subscribe/unsubscribe and delivery failures

use thiserror::Error;

use crate::transport::SubscriptionId;

/// Errors produced at the factory store boundary.
///
/// `Conflict` and `NotFound` are expected, recoverable-by-caller outcomes.
/// `Server` wraps the underlying storage cause and is opaque to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Server(#[source] anyhow::Error),
}

impl StoreError {
    pub fn server(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Server(err.into())
    }
}

/// Errors from the channel transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("subscription to channel '{channel}' failed: {reason}")]
    SubscribeFailed { channel: String, reason: String },

    #[error("no active subscription {id:?} on channel '{channel}'")]
    UnknownSubscription {
        channel: String,
        id: SubscriptionId,
    },

    #[error("channel '{channel}' lagged, {missed} messages dropped")]
    Lagged { channel: String, missed: u64 },

    #[error("channel '{channel}' closed")]
    Closed { channel: String },
}
