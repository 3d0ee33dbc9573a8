//! Request-handling core for the Tutor Nexus API.
//!
//! The crate is organized around five components:
//! - [`contract`] - the schema contract registry enforcing every route's
//!   declared request and response shapes at runtime
//! - [`vault`] - envelope encryption for user-supplied provider API keys
//! - [`session`] - per-session actors with single-writer semantics
//! - [`store`] - the multi-store router over the three data domains
//! - [`server`] + [`handlers`] - the gateway composing the above per request

pub mod api;
pub mod auth;
pub mod config;
pub mod contract;
pub mod gateway;
pub mod handlers;
pub mod server;
pub mod session;
pub mod store;
pub mod vault;
