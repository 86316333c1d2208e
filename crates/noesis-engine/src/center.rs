//! Plugin Center (§4.5): per-brain plugin registry, lookup, execution, and
//! scheduled refresh.

use noesis_core::{BrainPlugin, PluginKind};
use noesis_types::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A registry scoped to one "brain" (analysis, generation, strategy, …).
/// Mutation APIs (`register_plugin`, `start_scheduled_tasks`,
/// `stop_scheduled_tasks`) are expected to run only during
/// startup/shutdown; `get_output`/`list_plugins` are safe during steady
/// state (§5).
pub struct PluginCenter {
    brain_name: String,
    plugins: RwLock<HashMap<String, Arc<dyn BrainPlugin>>>,
    scheduled_handles: RwLock<Vec<JoinHandle<()>>>,
}

impl PluginCenter {
    pub fn new(brain_name: impl Into<String>) -> Self {
        Self {
            brain_name: brain_name.into(),
            plugins: RwLock::new(HashMap::new()),
            scheduled_handles: RwLock::new(Vec::new()),
        }
    }

    pub async fn register_plugin(&self, plugin: Arc<dyn BrainPlugin>) {
        let mut plugins = self.plugins.write().await;
        plugins.insert(plugin.name().to_string(), plugin);
    }

    pub async fn has_plugin(&self, name: &str) -> bool {
        self.plugins.read().await.contains_key(name)
    }

    pub async fn list_plugins(&self) -> Vec<String> {
        self.plugins.read().await.keys().cloned().collect()
    }

    /// `get_output(name, context)`: missing plugin returns `{}`, any
    /// exception is caught and logged with `{}`.
    pub async fn get_output(&self, name: &str, context: &Map<String, Value>) -> Map<String, Value> {
        let plugin = {
            let plugins = self.plugins.read().await;
            plugins.get(name).cloned()
        };
        let Some(plugin) = plugin else {
            warn!(brain = self.brain_name, plugin = name, "plugin not registered, returning empty output");
            return Map::new();
        };
        match plugin.get_output(context).await {
            Ok(output) => output,
            Err(e) => {
                error!(brain = self.brain_name, plugin = name, error = %e, "plugin get_output failed");
                Map::new()
            }
        }
    }

    /// Spawns one periodic `tokio::time::interval` task per scheduled
    /// plugin, collecting the handles so `stop_scheduled_tasks` can abort
    /// them idempotently. Matches `kind == PluginKind::Scheduled ⇒
    /// schedule_config present with interval_hours > 0`.
    pub async fn start_scheduled_tasks(self: &Arc<Self>) {
        let plugins = self.plugins.read().await;
        let scheduled: Vec<Arc<dyn BrainPlugin>> = plugins
            .values()
            .filter(|p| p.kind() == PluginKind::Scheduled)
            .cloned()
            .collect();
        drop(plugins);

        let mut handles = self.scheduled_handles.write().await;
        for plugin in scheduled {
            let Some(schedule) = plugin.schedule_config() else {
                warn!(brain = self.brain_name, plugin = plugin.name(), "scheduled plugin has no schedule_config, skipping");
                continue;
            };
            if schedule.interval_hours == 0 {
                warn!(brain = self.brain_name, plugin = plugin.name(), "scheduled plugin has zero interval_hours, skipping");
                continue;
            }
            let brain_name = self.brain_name.clone();
            let period = std::time::Duration::from_secs(schedule.interval_hours as u64 * 3600);
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await; // first tick fires immediately; consume it here
                loop {
                    ticker.tick().await;
                    if let Err(e) = plugin.refresh().await {
                        warn!(brain = brain_name, plugin = plugin.name(), error = %e, "scheduled refresh failed");
                    }
                }
            });
            handles.push(handle);
        }
    }

    /// Primes caches without blocking startup: spawns each scheduled
    /// plugin's `refresh` once and returns immediately (§9 decision).
    pub async fn run_initial_refresh(&self) {
        let plugins = self.plugins.read().await;
        let scheduled: Vec<Arc<dyn BrainPlugin>> = plugins
            .values()
            .filter(|p| p.kind() == PluginKind::Scheduled)
            .cloned()
            .collect();
        drop(plugins);

        let brain_name = self.brain_name.clone();
        for plugin in scheduled {
            let brain_name = brain_name.clone();
            tokio::spawn(async move {
                if let Err(e) = plugin.refresh().await {
                    warn!(brain = brain_name, plugin = plugin.name(), error = %e, "initial refresh failed");
                }
            });
        }
    }

    /// Idempotent: a second call finds no handles left to abort (§8
    /// property 9).
    pub async fn stop_scheduled_tasks(&self) {
        let mut handles = self.scheduled_handles.write().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
        info!(brain = self.brain_name, "scheduled tasks stopped");
    }
}

/// A static registration-table entry for one brain: the Rust analog of a
/// `(module_path, register_fn_name)` dynamic-import pair (§4.5 Loader). A
/// registration function returning `Err` is logged and skipped; it never
/// aborts the remaining table.
pub type PluginRegistrar = fn(&PluginCenter) -> Result<()>;

/// Runs every registrar in `table` against `center`, isolating failures
/// per-entry so partial registration is acceptable.
pub async fn load_plugins_for_brain(center: &PluginCenter, table: &[(&'static str, PluginRegistrar)]) {
    for (name, registrar) in table {
        if let Err(e) = registrar(center) {
            warn!(plugin = *name, error = %e, "plugin registration failed, skipping");
        }
    }
}
