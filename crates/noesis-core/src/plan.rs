//! Strategy Planner output: a typed, bounded plan of steps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Built-in step names the orchestrator knows how to dispatch directly.
/// Any other `step_name` is looked up in the Plugin Registry.
pub const STEP_WEB_SEARCH: &str = "web_search";
pub const STEP_MEMORY_QUERY: &str = "memory_query";
pub const STEP_ANALYZE: &str = "analyze";
pub const STEP_GENERATE: &str = "generate";
pub const STEP_EVALUATE: &str = "evaluate";

/// Hotspot step names are not a single constant: any step name ending in
/// `_hotspot` (e.g. `bilibili_hotspot`) is routed to the matching Plugin
/// Center plugin of the same name.
pub fn is_hotspot_step(step_name: &str) -> bool {
    step_name.ends_with("_hotspot")
}

/// A step is safe to run in the orchestrator's parallel phase when it has
/// no dependency on another step's output: `web_search`, `memory_query`,
/// and any hotspot step.
pub fn is_parallel_safe(step_name: &str) -> bool {
    step_name == STEP_WEB_SEARCH || step_name == STEP_MEMORY_QUERY || is_hotspot_step(step_name)
}

/// Minimum and maximum plan length (§3 invariant).
pub const PLAN_MIN_STEPS: usize = 2;
pub const PLAN_MAX_STEPS: usize = 6;

/// One step of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub reason: String,
}

impl PlanStep {
    pub fn new(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            params: HashMap::new(),
            reason: reason.into(),
        }
    }
}

/// An ordered plan plus the task classification that drives plugin-list
/// derivation (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub task_type: Option<String>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>, task_type: Option<String>) -> Self {
        Self { steps, task_type }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, step_name: &str) -> bool {
        self.steps.iter().any(|s| s.step == step_name)
    }

    /// Post-filter (§4.8): drop any `generate` step unless content generation
    /// was explicitly requested. Returns whether a correction was applied,
    /// so the caller can log it.
    pub fn strip_generate_unless_explicit(&mut self, explicit_content_request: bool) -> bool {
        if explicit_content_request {
            return false;
        }
        let before = self.steps.len();
        self.steps.retain(|s| s.step != STEP_GENERATE);
        before != self.steps.len()
    }

    /// Splits the plan into (parallel-safe, sequential) step lists,
    /// preserving relative order within each group (§4.9 Phase B).
    pub fn split_parallel_sequential(&self) -> (Vec<PlanStep>, Vec<PlanStep>) {
        let mut parallel = Vec::new();
        let mut sequential = Vec::new();
        for step in &self.steps {
            if is_parallel_safe(&step.step) {
                parallel.push(step.clone());
            } else {
                sequential.push(step.clone());
            }
        }
        (parallel, sequential)
    }
}

/// Default plan used when the planner's JSON response fails to parse
/// (§4.8): depends on whether content generation was explicitly requested.
pub fn default_plan(explicit_content_request: bool) -> Plan {
    if explicit_content_request {
        Plan::new(
            vec![
                PlanStep::new(STEP_ANALYZE, "默认分析"),
                PlanStep::new(STEP_GENERATE, "默认生成"),
                PlanStep::new(STEP_EVALUATE, "默认评估"),
            ],
            None,
        )
    } else {
        Plan::new(
            vec![
                PlanStep::new(STEP_WEB_SEARCH, "默认检索"),
                PlanStep::new(STEP_ANALYZE, "默认分析"),
            ],
            None,
        )
    }
}

/// The one documented `task_type -> generation plugins` entry (§4.10),
/// with a default fallback for any other task type.
pub const DEFAULT_GENERATION_PLUGIN: &str = "text_generator";

pub fn generation_plugins_for_task(task_type: Option<&str>) -> Vec<&'static str> {
    match task_type {
        Some("campaign_or_copy") => vec!["text_generator", "campaign_plan_generator"],
        _ => vec![DEFAULT_GENERATION_PLUGIN],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_generate_when_not_explicit() {
        let mut plan = Plan::new(
            vec![PlanStep::new(STEP_ANALYZE, "r"), PlanStep::new(STEP_GENERATE, "r")],
            None,
        );
        assert!(plan.strip_generate_unless_explicit(false));
        assert!(!plan.contains(STEP_GENERATE));
    }

    #[test]
    fn keeps_generate_when_explicit() {
        let mut plan = Plan::new(vec![PlanStep::new(STEP_GENERATE, "r")], None);
        assert!(!plan.strip_generate_unless_explicit(true));
        assert!(plan.contains(STEP_GENERATE));
    }

    #[test]
    fn default_plan_depends_on_explicit_request() {
        assert!(default_plan(true).contains(STEP_GENERATE));
        assert!(!default_plan(false).contains(STEP_GENERATE));
    }

    #[test]
    fn splits_by_parallel_safety() {
        let plan = Plan::new(
            vec![
                PlanStep::new(STEP_WEB_SEARCH, "r"),
                PlanStep::new("bilibili_hotspot", "r"),
                PlanStep::new(STEP_ANALYZE, "r"),
                PlanStep::new(STEP_GENERATE, "r"),
            ],
            None,
        );
        let (parallel, sequential) = plan.split_parallel_sequential();
        assert_eq!(parallel.len(), 2);
        assert_eq!(sequential.len(), 2);
    }

    #[test]
    fn generation_plugins_fall_back_to_default() {
        assert_eq!(generation_plugins_for_task(Some("unknown")), vec![DEFAULT_GENERATION_PLUGIN]);
        assert_eq!(
            generation_plugins_for_task(Some("campaign_or_copy")),
            vec!["text_generator", "campaign_plan_generator"]
        );
    }
}
