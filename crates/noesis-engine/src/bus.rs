//! Plugin Bus (§4.4): bounded-depth event fan-out over registered plugins.

use noesis_core::{BusPlugin, PluginEvent, PLUGIN_BUS_MAX_DEPTH};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

/// Process-wide ordered plugin list behind an `RwLock`, snapshotted with a
/// read-lock clone on each publish so the fan-out iterates a stable copy
/// while registration can still happen concurrently.
#[derive(Default)]
pub struct PluginBus {
    plugins: RwLock<Vec<Arc<dyn BusPlugin>>>,
}

impl PluginBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, plugin: Arc<dyn BusPlugin>) {
        let mut plugins = self.plugins.write().await;
        plugins.push(plugin);
    }

    /// `publish(event)`: sequential fan-out in registration order, each
    /// plugin guarded by its own exception barrier. A `handle` that returns
    /// a follow-up event is republished recursively, bounded by
    /// `PLUGIN_BUS_MAX_DEPTH`.
    pub async fn publish(&self, event: PluginEvent) {
        self.publish_at_depth(event, 0).await;
    }

    async fn publish_at_depth(&self, event: PluginEvent, depth: u32) {
        if depth >= PLUGIN_BUS_MAX_DEPTH {
            warn!(event_type = %event.event_type, depth, "plugin bus chain depth exceeded, dropping event");
            return;
        }

        let snapshot = { self.plugins.read().await.clone() };
        let mut follow_ups = Vec::new();

        for plugin in &snapshot {
            if !plugin.can_handle(&event).await {
                continue;
            }
            match plugin.handle(&event).await {
                Ok(Some(follow_up)) => follow_ups.push(follow_up),
                Ok(None) => {}
                Err(e) => {
                    error!(plugin = plugin.name(), event_type = %event.event_type, error = %e, "plugin handler failed");
                }
            }
        }

        for follow_up in follow_ups {
            Box::pin(self.publish_at_depth(follow_up, depth + 1)).await;
        }
    }

    pub async fn registered_count(&self) -> usize {
        self.plugins.read().await.len()
    }
}
