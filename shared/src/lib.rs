//! Shared types and models for the refurbished-equipment inventory
//!
//! This crate holds the device lifecycle rules shared between the backend,
//! the browser grid (via WASM) and the integration tests.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
