//! Shared error, id, and result types used across the engine crates.

pub mod error;
pub mod ids;

pub use error::{EngineError, Result};
pub use ids::*;
