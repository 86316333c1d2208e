//! Pure domain model for the deep-thinking engine.
//!
//! This crate defines the shared state, event, and plan types plus the
//! capability-port traits every adapter implements. Nothing here performs
//! I/O; infrastructure lives in `noesis-infra` and `noesis-engine`.

pub mod capabilities;
pub mod intent;
pub mod memory;
pub mod plan;
pub mod plugin;
pub mod ports;
pub mod state;

pub use capabilities::*;
pub use intent::*;
pub use memory::*;
pub use plan::*;
pub use plugin::*;
pub use state::*;
