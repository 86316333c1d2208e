//! `MetaState`: the single mutable record threaded through one orchestrator
//! invocation (§3).

use crate::plan::Plan;
use noesis_types::{SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry in the append-only thinking-log trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingLogEntry {
    pub step: String,
    pub thought: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ThinkingLogEntry {
    pub fn new(step: impl Into<String>, thought: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            thought: thought.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// One entry in the append-only step-output trail. `result` is absent and
/// `error` is set when the step failed (§7, testable property #4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub step: String,
    pub reason: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StepOutput {
    pub fn ok(step: impl Into<String>, reason: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            step: step.into(),
            reason: reason.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn timeout(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            reason: reason.into(),
            result: None,
            error: Some("timeout".to_string()),
        }
    }

    pub fn failed(step: impl Into<String>, reason: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            reason: reason.into(),
            result: None,
            error: Some(error.into()),
        }
    }
}

/// The full execution state threaded through planning, execution, and
/// compilation. All fields are always present; a missing value reads as
/// the type's zero value, never `null`-then-missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub user_input: String,
    #[serde(default)]
    pub analysis: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub evaluation: serde_json::Map<String, serde_json::Value>,
    pub session_id: SessionId,
    pub user_id: UserId,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub current_step: usize,
    #[serde(default)]
    pub thinking_logs: Vec<ThinkingLogEntry>,
    #[serde(default)]
    pub step_outputs: Vec<StepOutput>,
    #[serde(default)]
    pub search_context: String,
    #[serde(default)]
    pub memory_context: String,
    #[serde(default)]
    pub kb_context: String,
    #[serde(default)]
    pub effective_tags: Vec<String>,
    #[serde(default)]
    pub analysis_plugins: Vec<String>,
    #[serde(default)]
    pub generation_plugins: Vec<String>,
    #[serde(default)]
    pub used_tags: Vec<String>,
    #[serde(default)]
    pub need_revision: bool,
    #[serde(default)]
    pub stage_durations: HashMap<String, f64>,
    #[serde(default)]
    pub analyze_cache_hit: bool,
}

impl MetaState {
    pub fn new(user_input: String, session_id: SessionId, user_id: UserId) -> Self {
        Self {
            user_input,
            analysis: serde_json::Map::new(),
            content: String::new(),
            evaluation: serde_json::Map::new(),
            session_id,
            user_id,
            plan: Plan::default(),
            current_step: 0,
            thinking_logs: Vec::new(),
            step_outputs: Vec::new(),
            search_context: String::new(),
            memory_context: String::new(),
            kb_context: String::new(),
            effective_tags: Vec::new(),
            analysis_plugins: Vec::new(),
            generation_plugins: Vec::new(),
            used_tags: Vec::new(),
            need_revision: false,
            stage_durations: HashMap::new(),
            analyze_cache_hit: false,
        }
    }

    pub fn append_thought(&mut self, step: impl Into<String>, thought: impl Into<String>) {
        self.thinking_logs.push(ThinkingLogEntry::new(step, thought));
    }

    pub fn record_stage_duration(&mut self, stage: impl Into<String>, seconds: f64) {
        self.stage_durations.insert(stage.into(), seconds);
    }

    /// Field-wise merge a plugin/sub-graph's `analysis` increment, preserving
    /// any key `increment` does not set (§4.5 merge convention, §8 property 8).
    pub fn merge_analysis(&mut self, increment: &serde_json::Map<String, serde_json::Value>) {
        for (k, v) in increment {
            self.analysis.insert(k.clone(), v.clone());
        }
    }

    /// Apply a bounded increment returned by a built-in handler or sub-graph
    /// (§4.9 "Unknown step name" / §4.10): only the named fields are
    /// overwritten, everything else in `self` is left untouched.
    pub fn apply_increment(&mut self, increment: MetaStateIncrement) {
        if let Some(analysis) = increment.analysis {
            self.merge_analysis(&analysis);
        }
        if let Some(content) = increment.content {
            self.content = content;
        }
        if let Some(used_tags) = increment.used_tags {
            self.used_tags = used_tags;
        }
        if let Some(search_context) = increment.search_context {
            self.search_context = search_context;
        }
        if let Some(memory_context) = increment.memory_context {
            self.memory_context = memory_context;
        }
        if let Some(effective_tags) = increment.effective_tags {
            self.effective_tags = effective_tags;
        }
        if let Some(evaluation) = increment.evaluation {
            self.evaluation = evaluation;
            self.need_revision = increment.need_revision.unwrap_or(self.need_revision);
        }
        if let Some(hit) = increment.analyze_cache_hit {
            self.analyze_cache_hit = hit;
        }
    }
}

/// A bounded set of fields a step handler or sub-graph may return. `None`
/// means "unchanged"; this is what makes `apply_increment` preserve
/// existing `MetaState` content by default.
#[derive(Debug, Clone, Default)]
pub struct MetaStateIncrement {
    pub analysis: Option<serde_json::Map<String, serde_json::Value>>,
    pub content: Option<String>,
    pub used_tags: Option<Vec<String>>,
    pub search_context: Option<String>,
    pub memory_context: Option<String>,
    pub effective_tags: Option<Vec<String>>,
    pub evaluation: Option<serde_json::Map<String, serde_json::Value>>,
    pub need_revision: Option<bool>,
    pub analyze_cache_hit: Option<bool>,
}
