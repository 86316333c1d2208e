//! Stateful engine: intent processing, strategy planning, plugin bus/center,
//! sub-graphs, the orchestrator and its narration/follow-up tail.
//!
//! `noesis-core` defines the pure domain model; this crate wires it to the
//! LLM transport, caches and capability adapters from `noesis-infra` and
//! `noesis-core::ports`.

pub mod bus;
pub mod center;
pub mod followup;
pub mod intent;
pub mod llm;
pub mod memory_service;
pub mod narrative;
pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod sub_graphs;

pub use bus::*;
pub use center::*;
pub use followup::*;
pub use intent::*;
pub use llm::*;
pub use memory_service::*;
pub use narrative::*;
pub use orchestrator::*;
pub use planner::*;
pub use registry::*;
pub use sub_graphs::*;
