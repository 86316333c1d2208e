//! Plugin Registry (§4.6): compiled, cached sub-workflow builders that the
//! orchestrator dispatches to for any step name it doesn't handle natively.

use async_trait::async_trait;
use noesis_core::{MetaState, MetaStateIncrement};
use noesis_types::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// A compiled sub-graph: a single-node workflow consuming a `MetaState`
/// snapshot and producing an increment to merge back.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait SubGraph: Send + Sync {
    async fn run(&self, state: &MetaState) -> Result<MetaStateIncrement>;
}

/// Builds a `SubGraph` once, at `init_plugins` time. Kept distinct from
/// `SubGraph` itself so a builder can do one-time setup (client
/// construction, config binding) that the compiled graph then reuses
/// across every invocation.
pub trait SubGraphBuilder: Send + Sync {
    fn build(&self) -> Result<Arc<dyn SubGraph>>;
}

/// Single-instance registry of compiled sub-graphs, keyed by step name.
#[derive(Default)]
pub struct PluginRegistry {
    builders: RwLock<HashMap<String, Arc<dyn SubGraphBuilder>>>,
    compiled: RwLock<HashMap<String, Arc<dyn SubGraph>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_workflow(&self, name: impl Into<String>, builder: Arc<dyn SubGraphBuilder>) {
        let mut builders = self.builders.write().await;
        builders.insert(name.into(), builder);
    }

    /// Invokes each registered builder once, caching the resulting
    /// `Arc<dyn SubGraph>`. A failing builder logs and is skipped; it does
    /// not prevent the remaining builders from compiling.
    pub async fn init_plugins(&self) {
        let builders = self.builders.read().await;
        let mut compiled = self.compiled.write().await;
        for (name, builder) in builders.iter() {
            match builder.build() {
                Ok(graph) => {
                    compiled.insert(name.clone(), graph);
                }
                Err(e) => warn!(workflow = name, error = %e, "sub-graph build failed, skipping"),
            }
        }
    }

    pub async fn get_workflow(&self, name: &str) -> Option<Arc<dyn SubGraph>> {
        self.compiled.read().await.get(name).cloned()
    }
}
