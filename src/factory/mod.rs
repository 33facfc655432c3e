//! Factory templates: persisted, shareable descriptions of how to
//! instantiate a workspace, with a REST façade over the store.

pub mod api;
pub mod models;
pub mod server;
pub mod store;
