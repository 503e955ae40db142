//! Pickup token service library.
//!
//! Issues uniquely numbered pickup tokens with an ETA, tracks them through
//! `pending -> preparing -> served` (or `cancelled`), and serves the HTTP API.
//! Exposed as a library so the binary, the CLI and the integration tests
//! share one router and one set of adapters.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
