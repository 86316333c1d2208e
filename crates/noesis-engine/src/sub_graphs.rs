//! Analysis & Generation Sub-graphs (§4.10): single-node sub-graphs over a
//! `MetaState` subset, dispatched by the orchestrator's `analyze` and
//! `generate` built-in steps. Grounded on
//! `original_source/workflows/{analysis_brain_subgraph.py, generation_brain_subgraph.py}`.

use crate::center::PluginCenter;
use crate::llm::{ChatMessage, Complexity, LlmClient, LlmRouter};
use crate::registry::SubGraph;
use async_trait::async_trait;
use noesis_core::{generation_plugins_for_task, MetaState, MetaStateIncrement, STEP_GENERATE};
use noesis_infra::cache::{build_fingerprint_key, DynCacheBackend, SmartCache};
use noesis_types::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a marketing analyst. Given a brand/product/topic and the \
supplied preference context, produce exactly one JSON object: \
{\"semantic_score\": 0-1, \"angle\": \"one concise hook sentence\", \"reason\": \"why this angle fits\"}. \
Output nothing but the JSON object.";

const STRATEGY_SYSTEM_PROMPT: &str = "You are a marketing strategist. The user has not asked for produced \
content yet, only strategic direction. Given the brand/product/topic and preference context, produce \
exactly one JSON object: {\"semantic_score\": 0-1, \"angle\": \"a short recommended-plan paragraph, not a \
catch-phrase\", \"reason\": \"why this plan fits\"}. Output nothing but the JSON object.";

const GENERATION_SYSTEM_PROMPT: &str = "You write marketing copy. Given an analysis (angle/reason), a topic, \
and optional supplementary reference material, write the requested content directly. Reference material is \
supplementary only: never let it override the stated topic or brand. Output only the content body, no \
preamble.";

fn parse_json_object(raw: &str) -> Option<Map<String, Value>> {
    let mut trimmed = raw.trim();
    for prefix in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            trimmed = rest.trim_start();
            break;
        }
    }
    if let Some(idx) = trimmed.rfind("```") {
        trimmed = trimmed[..idx].trim();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn default_angle_fallback(strategy_mode: bool) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("semantic_score".to_string(), Value::from(0.3));
    if strategy_mode {
        map.insert(
            "angle".to_string(),
            Value::from("建议先明确目标受众与核心卖点，再决定传播渠道与内容形式。"),
        );
    } else {
        map.insert("angle".to_string(), Value::from("围绕产品核心卖点展开"));
    }
    map.insert("reason".to_string(), Value::from("分析服务暂时不可用，使用默认切入点"));
    map
}

/// Analysis sub-graph: dispatches `MetaState.analysis_plugins` through the
/// analysis brain's Plugin Center in parallel, each under its own timeout,
/// and calls the LLM Router directly for the default semantic-score/angle
/// analysis.
pub struct AnalysisSubGraph<C: LlmClient> {
    router: Arc<LlmRouter<C>>,
    center: Arc<PluginCenter>,
    plugin_timeout: Duration,
    cache: Option<Arc<SmartCache<DynCacheBackend>>>,
    analyze_ttl_seconds: u64,
}

impl<C: LlmClient> AnalysisSubGraph<C> {
    pub fn new(
        router: Arc<LlmRouter<C>>,
        center: Arc<PluginCenter>,
        plugin_timeout: Duration,
        cache: Option<Arc<SmartCache<DynCacheBackend>>>,
        analyze_ttl_seconds: u64,
    ) -> Self {
        Self { router, center, plugin_timeout, cache, analyze_ttl_seconds }
    }

    async fn run_plugin(&self, name: &str, context: &Map<String, Value>) -> Map<String, Value> {
        match tokio::time::timeout(self.plugin_timeout, self.center.get_output(name, context)).await {
            Ok(output) => output,
            Err(_) => {
                warn!(plugin = name, "analysis plugin timed out");
                Map::new()
            }
        }
    }

    async fn default_analysis(&self, state: &MetaState, preference_ctx: &str, strategy_mode: bool) -> Map<String, Value> {
        let input: Value = serde_json::from_str(&state.user_input).unwrap_or(Value::Null);
        let brand = input.get("brand_name").and_then(|v| v.as_str()).unwrap_or("");
        let product = input.get("product_desc").and_then(|v| v.as_str()).unwrap_or("");
        let topic = input.get("topic").and_then(|v| v.as_str()).unwrap_or("");

        let system = if strategy_mode { STRATEGY_SYSTEM_PROMPT } else { ANALYSIS_SYSTEM_PROMPT };
        let user_prompt = format!(
            "Brand: {}\nProduct: {}\nTopic: {}\n\nPreference context:\n{}\n\nProduce the analysis JSON.",
            if brand.is_empty() { "unspecified" } else { brand },
            if product.is_empty() { "unspecified" } else { product },
            if topic.is_empty() { "unspecified" } else { topic },
            if preference_ctx.is_empty() { "(none)" } else { preference_ctx },
        );
        let messages = [ChatMessage::system(system), ChatMessage::user(user_prompt)];

        match self.router.invoke(&messages, "analysis", Complexity::High).await {
            Ok(text) => parse_json_object(&text).unwrap_or_else(|| default_angle_fallback(strategy_mode)),
            Err(e) => {
                warn!(error = %e, "default analysis LLM call failed, using fallback angle");
                default_angle_fallback(strategy_mode)
            }
        }
    }

    /// Wraps `default_analysis` with the Smart Cache (§4.1), keyed by
    /// `context_fingerprint = {tags: effective_tags}` per §4.9, plus the
    /// strategy/generate mode so the two shapes never collide under the
    /// same tag set. Tags are sorted before hashing so reordering a tag
    /// list is not a cache miss (§8 scenario E6).
    async fn cached_default_analysis(&self, state: &MetaState, preference_ctx: &str, strategy_mode: bool) -> Result<(Map<String, Value>, bool)> {
        match &self.cache {
            Some(cache) if self.analyze_ttl_seconds > 0 => {
                let mut sorted_tags = state.effective_tags.clone();
                sorted_tags.sort();
                let mut fingerprint = Map::new();
                fingerprint.insert("tags".to_string(), Value::from(sorted_tags));
                fingerprint.insert("mode".to_string(), Value::from(if strategy_mode { "strategy" } else { "analysis" }));
                let key = build_fingerprint_key("analyze:", &fingerprint);

                cache
                    .get_or_set(&key, self.analyze_ttl_seconds, || async { Ok(self.default_analysis(state, preference_ctx, strategy_mode).await) })
                    .await
            }
            _ => Ok((self.default_analysis(state, preference_ctx, strategy_mode).await, false)),
        }
    }
}

#[async_trait]
impl<C: LlmClient> SubGraph for AnalysisSubGraph<C> {
    async fn run(&self, state: &MetaState) -> Result<MetaStateIncrement> {
        let strategy_mode = !state.plan.contains(STEP_GENERATE);

        let mut preference_ctx = state.memory_context.clone();
        if !state.search_context.is_empty() {
            preference_ctx.push_str("\n\n【网络检索信息】\n");
            preference_ctx.push_str(&state.search_context);
        }
        if !state.kb_context.is_empty() {
            preference_ctx.push_str("\n\n【知识库检索】\n");
            preference_ctx.push_str(&state.kb_context);
        }

        let plugin_context: Map<String, Value> = Map::from_iter([
            ("user_input".to_string(), Value::from(state.user_input.clone())),
            ("memory_context".to_string(), Value::from(state.memory_context.clone())),
            ("search_context".to_string(), Value::from(state.search_context.clone())),
        ]);

        let plugin_futures = state.analysis_plugins.iter().map(|name| self.run_plugin(name, &plugin_context));
        let (default_outcome, plugin_results) =
            futures::future::join(self.cached_default_analysis(state, &preference_ctx, strategy_mode), futures::future::join_all(plugin_futures))
                .await;
        let (mut merged, cache_hit) = default_outcome?;

        for output in plugin_results {
            for (k, v) in output {
                merged.insert(k, v);
            }
        }
        // Existing analysis (e.g. keys a parallel hotspot step already set)
        // fills any gap merged doesn't cover, but never overrides merged.
        for (k, v) in &state.analysis {
            merged.entry(k.clone()).or_insert_with(|| v.clone());
        }

        Ok(MetaStateIncrement {
            analysis: Some(merged),
            analyze_cache_hit: Some(cache_hit),
            ..Default::default()
        })
    }
}

/// Generation sub-graph: dispatches the best-fit generation plugin for
/// `plan.task_type` through the generation brain's Plugin Center, falling
/// back to calling the LLM Router directly when no plugin is registered
/// under that name (the common case for the documented default plugin).
pub struct GenerationSubGraph<C: LlmClient> {
    router: Arc<LlmRouter<C>>,
    center: Arc<PluginCenter>,
    plugin_timeout: Duration,
}

impl<C: LlmClient> GenerationSubGraph<C> {
    pub fn new(router: Arc<LlmRouter<C>>, center: Arc<PluginCenter>, plugin_timeout: Duration) -> Self {
        Self { router, center, plugin_timeout }
    }

    async fn generate_via_llm(&self, state: &MetaState, topic: &str, raw_query: &str) -> String {
        let angle = state.analysis.get("angle").and_then(|v| v.as_str()).unwrap_or("");
        let reason = state.analysis.get("reason").and_then(|v| v.as_str()).unwrap_or("");

        let mut user_prompt = format!(
            "Topic: {}\nUser request: {}\nAnalysis angle: {}\nAnalysis reason: {}\n",
            if topic.is_empty() { raw_query } else { topic },
            raw_query,
            angle,
            reason,
        );
        if !state.memory_context.is_empty() {
            user_prompt.push_str(&format!("\nUser preference context:\n{}\n", state.memory_context));
        }

        let messages = [ChatMessage::system(GENERATION_SYSTEM_PROMPT), ChatMessage::user(user_prompt)];
        match self.router.invoke(&messages, "chat_reply", Complexity::High).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "generation LLM call failed, returning placeholder content");
                "内容生成暂时不可用，请稍后重试。".to_string()
            }
        }
    }
}

#[async_trait]
impl<C: LlmClient> SubGraph for GenerationSubGraph<C> {
    async fn run(&self, state: &MetaState) -> Result<MetaStateIncrement> {
        let input: Value = serde_json::from_str(&state.user_input).unwrap_or(Value::Null);
        let topic = input.get("topic").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let raw_query = input.get("raw_query").and_then(|v| v.as_str()).unwrap_or(&state.user_input).to_string();

        let plugins = generation_plugins_for_task(state.plan.task_type.as_deref());
        let plugin_name = plugins.first().copied().unwrap_or("text_generator");

        let plugin_context: Map<String, Value> = Map::from_iter([
            ("analysis".to_string(), Value::Object(state.analysis.clone())),
            ("topic".to_string(), Value::from(topic.clone())),
            ("raw_query".to_string(), Value::from(raw_query.clone())),
        ]);

        let plugin_output = match tokio::time::timeout(self.plugin_timeout, self.center.get_output(plugin_name, &plugin_context)).await {
            Ok(output) => output,
            Err(_) => {
                warn!(plugin = plugin_name, "generation plugin timed out");
                Map::new()
            }
        };

        let content = match plugin_output.get("content").and_then(|v| v.as_str()) {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => self.generate_via_llm(state, &topic, &raw_query).await,
        };

        Ok(MetaStateIncrement {
            content: Some(content),
            ..Default::default()
        })
    }
}
