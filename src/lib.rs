//! Atelier: workspace lifecycle event routing and factory templates for a
//! cloud IDE platform.
//!
//! Two loosely coupled halves share a channel transport:
//! - [`workspace`] tracks a workspace's event channels and dispatches typed
//!   lifecycle events to injected collaborators.
//! - [`factory`] persists shareable workspace templates behind a
//!   conflict/not-found/server error taxonomy, fronted by a REST API and a
//!   WebSocket channel bridge.

pub mod bus;
pub mod config;
pub mod errors;
pub mod factory;
pub mod transport;
pub mod workspace;
