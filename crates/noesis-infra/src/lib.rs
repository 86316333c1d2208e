pub mod adapters;
pub mod cache;
pub mod config;
pub mod memory_repo;

pub use adapters::*;
pub use cache::*;
pub use config::*;
pub use memory_repo::*;
