//! Plugin Bus event type and Plugin Center descriptor model (§3, §4.4, §4.5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use noesis_types::Result;
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Closed set of predefined event types (§6). User-defined types are plain
/// strings and are equally valid.
pub const EVENT_DOCUMENT_UPLOADED: &str = "document_uploaded";
pub const EVENT_DOCUMENT_QUERY: &str = "document_query";
pub const EVENT_INTENT_RECOGNIZED: &str = "intent_recognized";
pub const EVENT_ANALYSIS_COMPLETED: &str = "analysis_completed";
pub const EVENT_WEB_SEARCH: &str = "web_search";
pub const EVENT_IMAGE_GENERATION: &str = "image_generation";
pub const EVENT_USER_QUERY: &str = "user_query";
pub const EVENT_REPORT_GENERATED: &str = "report_generated";
pub const EVENT_USER_CONFIRM: &str = "user_confirm";
pub const EVENT_DIAGNOSIS_COMPLETED: &str = "diagnosis_completed";

/// Maximum recursive publish depth before the bus stops and logs (§4.4, §8
/// property 7).
pub const PLUGIN_BUS_MAX_DEPTH: u32 = 32;

/// An event flowing through the Plugin Bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEvent {
    pub event_type: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Map<String, serde_json::Value>,
}

impl PluginEvent {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            timestamp: Utc::now(),
            data: Map::new(),
        }
    }

    pub fn with_data(mut self, data: Map<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    /// Build a follow-up event from a handler's return value, preserving the
    /// original `source` (§4.4).
    pub fn to_follow_up(&self, new_type: impl Into<String>, new_data: Option<Map<String, serde_json::Value>>) -> Self {
        Self {
            event_type: new_type.into(),
            source: self.source.clone(),
            timestamp: Utc::now(),
            data: new_data.unwrap_or_default(),
        }
    }
}

/// A Plugin Bus subscriber. Both `can_handle` and `handle` are called under
/// an exception barrier by the bus: an error here is logged and skips this
/// plugin for this event, never aborts the fan-out (§4.4).
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait BusPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn can_handle(&self, event: &PluginEvent) -> bool;

    /// Returning `Ok(Some(event))` re-publishes that event as a follow-up.
    async fn handle(&self, event: &PluginEvent) -> Result<Option<PluginEvent>>;
}

/// Lifecycle category of a plugin registered with a Plugin Center (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Realtime,
    Scheduled,
    Workflow,
    Skill,
}

/// Refresh cadence for a scheduled plugin. Invariant: present and
/// `interval_hours > 0` iff `kind == PluginKind::Scheduled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub interval_hours: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_hours: 6 }
    }
}

/// A capability registered with a per-brain Plugin Center. `get_output` is
/// called synchronously on the request path; `refresh` (if present) is
/// invoked by the scheduler on `schedule_config.interval_hours`.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait BrainPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> PluginKind;

    fn schedule_config(&self) -> Option<ScheduleConfig> {
        None
    }

    /// Produce this plugin's output for the given context. Missing/failed
    /// plugins are handled by the Plugin Center, not by the plugin itself
    /// returning an empty map.
    async fn get_output(&self, context: &Map<String, serde_json::Value>) -> Result<Map<String, serde_json::Value>>;

    /// Refresh this plugin's cached output. Only called for
    /// `PluginKind::Scheduled` plugins.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_up_preserves_source() {
        let event = PluginEvent::new(EVENT_USER_QUERY, "chat-api");
        let follow_up = event.to_follow_up(EVENT_ANALYSIS_COMPLETED, None);
        assert_eq!(follow_up.source, "chat-api");
        assert_eq!(follow_up.event_type, EVENT_ANALYSIS_COMPLETED);
    }
}
