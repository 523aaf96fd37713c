//! Database models for the inventory server
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
