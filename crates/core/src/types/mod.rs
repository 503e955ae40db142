//! Core types for the pickup service.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod location;
pub mod scan;
pub mod status;
pub mod token_number;

pub use id::*;
pub use location::{GeoPoint, GeoPointError};
pub use scan::{ScanPayloadError, parse_scan_payload};
pub use status::*;
pub use token_number::{TokenNumber, TokenNumberError};
