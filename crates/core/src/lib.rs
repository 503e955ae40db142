//! Pickup Core - Shared types library.
//!
//! This crate provides the types and pure arithmetic used by every pickup
//! component:
//! - `server` - Token issuance and lifecycle HTTP service
//! - `cli` - Command-line tools for migrations and operator tasks
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no clocks read ambiently. Anything time-dependent takes `now` as a
//! parameter so results are reproducible.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, token numbers, coordinates and statuses
//! - [`eta`] - Pickup time estimation from distance, service time and backlog

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod eta;
pub mod types;

pub use eta::{EtaError, EtaEstimate, estimate_pickup};
pub use types::*;
