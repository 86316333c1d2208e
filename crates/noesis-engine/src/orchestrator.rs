//! Orchestrator (§4.9): drives one plan against a shared `MetaState` in
//! three phases (Planning / Execution / Compilation). Grounded on
//! `original_source/workflows/meta_workflow.py` for business semantics and
//! on `brain-cognitive/src/orchestrator/executor.rs`'s
//! `Semaphore` + `tokio::time::timeout` + `join_all` idiom for the
//! concurrency shape, generalized here from DAG nodes to plan steps.

use crate::center::PluginCenter;
use crate::llm::{ChatMessage, Complexity, LlmClient, LlmRouter};
use crate::memory_service::MemoryPort;
use crate::narrative::NarrativeSynthesizer;
use crate::planner::StrategyPlanner;
use crate::registry::PluginRegistry;
use crate::sub_graphs::{AnalysisSubGraph, GenerationSubGraph};
use noesis_core::ports::format_results_as_context;
use noesis_core::{
    is_hotspot_step, Capabilities, MetaState, MetaStateIncrement, PlanStep, ProcessedInput, StepOutput,
    STEP_ANALYZE, STEP_EVALUATE, STEP_GENERATE, STEP_MEMORY_QUERY, STEP_WEB_SEARCH,
};
use noesis_types::{EngineError, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

const EVALUATION_SYSTEM_PROMPT: &str = "You evaluate marketing copy quality. Given the content and its \
context, produce exactly one JSON object: {\"scores\": {\"consistency\": 0-10, \"creativity\": 0-10, \
\"safety\": 0-10, \"platform_fit\": 0-10}, \"overall\": 0-10, \"suggestions\": \"one actionable sentence\"}. \
Output nothing but the JSON object.";

fn default_evaluation(reason: &str) -> Map<String, Value> {
    let mut scores = Map::new();
    for key in ["consistency", "creativity", "safety", "platform_fit"] {
        scores.insert(key.to_string(), Value::from(5));
    }
    let mut map = Map::new();
    map.insert("scores".to_string(), Value::Object(scores));
    map.insert("overall".to_string(), Value::from(5.0));
    map.insert("overall_score".to_string(), Value::from(5));
    map.insert("suggestions".to_string(), Value::from(reason));
    map.insert("evaluation_failed".to_string(), Value::from(true));
    map
}

fn parse_evaluation_json(raw: &str) -> Option<Map<String, Value>> {
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

fn default_search_query(state: &MetaState) -> String {
    let input: Value = serde_json::from_str(&state.user_input).unwrap_or(Value::Null);
    let brand = input.get("brand_name").and_then(|v| v.as_str()).unwrap_or("");
    let product = input.get("product_desc").and_then(|v| v.as_str()).unwrap_or("");
    let topic = input.get("topic").and_then(|v| v.as_str()).unwrap_or("");
    let parts: Vec<&str> = [brand, product, topic].into_iter().filter(|s| !s.is_empty()).collect();
    if parts.is_empty() {
        state.user_input.clone()
    } else {
        parts.join(" ")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

/// A short, serializable preview of what an increment changed, used as
/// `step_outputs[i].result`.
fn increment_summary(increment: &MetaStateIncrement) -> Value {
    let mut obj = Map::new();
    if let Some(content) = &increment.content {
        obj.insert("content_preview".to_string(), Value::from(truncate(content, 200)));
    }
    if let Some(analysis) = &increment.analysis {
        obj.insert("analysis_keys".to_string(), Value::from(analysis.keys().cloned().collect::<Vec<_>>()));
    }
    if let Some(ctx) = &increment.search_context {
        obj.insert("search_context_chars".to_string(), Value::from(ctx.chars().count()));
    }
    if let Some(ctx) = &increment.memory_context {
        obj.insert("memory_context_chars".to_string(), Value::from(ctx.chars().count()));
    }
    if let Some(evaluation) = &increment.evaluation {
        obj.insert("evaluation".to_string(), Value::Object(evaluation.clone()));
    }
    Value::Object(obj)
}

enum StepFailure {
    Timeout,
    Failed(EngineError),
}

/// Drives a plan against shared `MetaState` in three phases. Generic over
/// the `LlmClient` implementation the strategy planner, sub-graphs,
/// evaluator, narrative synthesizer and follow-up advisor all share.
pub struct Orchestrator<C: LlmClient> {
    planner: Arc<StrategyPlanner<C>>,
    router: Arc<LlmRouter<C>>,
    memory: Arc<dyn MemoryPort>,
    capabilities: Arc<Capabilities>,
    hotspot_center: Arc<PluginCenter>,
    analysis_graph: Arc<AnalysisSubGraph<C>>,
    generation_graph: Arc<GenerationSubGraph<C>>,
    narrative: Arc<NarrativeSynthesizer<C>>,
    registry: Arc<PluginRegistry>,
    semaphore: Arc<Semaphore>,
    step_timeout: Duration,
}

impl<C: LlmClient> Orchestrator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        planner: Arc<StrategyPlanner<C>>,
        router: Arc<LlmRouter<C>>,
        memory: Arc<dyn MemoryPort>,
        capabilities: Arc<Capabilities>,
        hotspot_center: Arc<PluginCenter>,
        analysis_graph: Arc<AnalysisSubGraph<C>>,
        generation_graph: Arc<GenerationSubGraph<C>>,
        narrative: Arc<NarrativeSynthesizer<C>>,
        registry: Arc<PluginRegistry>,
        max_concurrent_capability_calls: usize,
        step_timeout: Duration,
    ) -> Self {
        Self {
            planner,
            router,
            memory,
            capabilities,
            hotspot_center,
            analysis_graph,
            generation_graph,
            narrative,
            registry,
            semaphore: Arc::new(Semaphore::new(max_concurrent_capability_calls.max(1))),
            step_timeout,
        }
    }

    /// Runs the full Planning -> Execution -> Compilation pipeline for one
    /// processed input, returning the final `MetaState` with the compiled
    /// report stored in `content`.
    pub async fn run(
        &self,
        input: &ProcessedInput,
        conversation_context: Option<&str>,
        session_document_context: Option<&str>,
    ) -> MetaState {
        let user_input = serde_json::to_string(&serde_json::json!({
            "brand_name": input.structured_data.brand_name,
            "product_desc": input.structured_data.product_desc,
            "topic": input.structured_data.topic,
            "raw_query": input.raw_query,
            "conversation_context": conversation_context,
            "session_document_context": session_document_context,
        }))
        .unwrap_or_else(|_| "{}".to_string());

        let mut state = MetaState::new(user_input, input.session_id.clone(), input.user_id.clone());

        // Phase A — Planning.
        let plan = self.planner.plan(input, conversation_context).await;
        state.append_thought(
            "planning",
            format!(
                "策略脑已规划 {} 个步骤: {}",
                plan.len(),
                plan.steps.iter().map(|s| s.step.as_str()).collect::<Vec<_>>().join(", "),
            ),
        );
        state.plan = plan;

        // Phase B — Execution.
        let (parallel_steps, sequential_steps) = state.plan.split_parallel_sequential();
        self.run_parallel_phase(&mut state, &parallel_steps).await;
        self.run_sequential_phase(&mut state, &sequential_steps).await;

        // Phase C — Compilation.
        let has_reference = session_document_context.map(|s| !s.trim().is_empty()).unwrap_or(false);
        let narrative = self.narrative.synthesize(&state, has_reference).await;
        let report = self.compile_report(&state, &narrative);
        state.content = report;

        info!(session_id = %state.session_id, steps = state.step_outputs.len(), "orchestrator invocation finished");
        state
    }

    async fn run_parallel_phase(&self, state: &mut MetaState, steps: &[PlanStep]) {
        if steps.is_empty() {
            return;
        }
        let snapshot = state.clone();
        let futures = steps.iter().map(|step| {
            let step = step.clone();
            let snapshot = snapshot.clone();
            async move {
                let result = self.dispatch_step(&snapshot, &step).await;
                (step, result)
            }
        });
        let results = futures::future::join_all(futures).await;
        for (step, result) in results {
            self.apply_step_result(state, &step, result);
        }
    }

    async fn run_sequential_phase(&self, state: &mut MetaState, steps: &[PlanStep]) {
        for step in steps {
            let snapshot = state.clone();
            let result = self.dispatch_step(&snapshot, step).await;
            self.apply_step_result(state, step, result);
            state.current_step += 1;
        }
    }

    fn apply_step_result(&self, state: &mut MetaState, step: &PlanStep, result: std::result::Result<MetaStateIncrement, StepFailure>) {
        match result {
            Ok(increment) => {
                state.append_thought(&step.step, format!("{} 执行完成", step.step));
                state.step_outputs.push(StepOutput::ok(&step.step, &step.reason, increment_summary(&increment)));
                state.apply_increment(increment);
            }
            Err(StepFailure::Timeout) => {
                warn!(step = step.step, "step timed out");
                state.append_thought(&step.step, "执行超时，已跳过");
                state.step_outputs.push(StepOutput::timeout(&step.step, &step.reason));
            }
            Err(StepFailure::Failed(e)) => {
                warn!(step = step.step, error = %e, "step failed");
                state.append_thought(&step.step, format!("执行失败: {e}"));
                state.step_outputs.push(StepOutput::failed(&step.step, &step.reason, e.to_string()));
            }
        }
    }

    async fn dispatch_step(&self, state: &MetaState, step: &PlanStep) -> std::result::Result<MetaStateIncrement, StepFailure> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StepFailure::Failed(EngineError::ExecutionError(format!("capability semaphore closed: {e}"))))?;

        let outcome = tokio::time::timeout(self.step_timeout, self.run_step(state, step)).await;
        drop(permit);

        match outcome {
            Ok(Ok(increment)) => Ok(increment),
            Ok(Err(e)) => Err(StepFailure::Failed(e)),
            Err(_) => Err(StepFailure::Timeout),
        }
    }

    async fn run_step(&self, state: &MetaState, step: &PlanStep) -> Result<MetaStateIncrement> {
        match step.step.as_str() {
            STEP_WEB_SEARCH => self.handle_web_search(state, step).await,
            STEP_MEMORY_QUERY => self.handle_memory_query(state).await,
            STEP_ANALYZE => self.analysis_graph.run(state).await,
            STEP_GENERATE => self.generation_graph.run(state).await,
            STEP_EVALUATE => self.handle_evaluate(state).await,
            name if is_hotspot_step(name) => self.handle_hotspot(step).await,
            name => self.handle_unknown_step(state, name).await,
        }
    }

    async fn handle_web_search(&self, state: &MetaState, step: &PlanStep) -> Result<MetaStateIncrement> {
        let query = step
            .params
            .get("query")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| default_search_query(state));
        let results = self.capabilities.search.search(&query, 5, "web").await?;
        Ok(MetaStateIncrement {
            search_context: Some(format_results_as_context(&results)),
            ..Default::default()
        })
    }

    async fn handle_memory_query(&self, state: &MetaState) -> Result<MetaStateIncrement> {
        let input: Value = serde_json::from_str(&state.user_input).unwrap_or(Value::Null);
        let brand = input.get("brand_name").and_then(|v| v.as_str()).unwrap_or("");
        let product = input.get("product_desc").and_then(|v| v.as_str()).unwrap_or("");
        let topic = input.get("topic").and_then(|v| v.as_str()).unwrap_or("");

        let context = self.memory.get_memory_for_analyze(&state.user_id, brand, product, topic, None).await?;
        Ok(MetaStateIncrement {
            memory_context: Some(context.preference_context),
            effective_tags: Some(context.effective_tags),
            ..Default::default()
        })
    }

    /// Expects `{"analysis": {"<plugin_name>": text}}` and merges the inner
    /// object directly into `MetaState.analysis` (§4.9).
    async fn handle_hotspot(&self, step: &PlanStep) -> Result<MetaStateIncrement> {
        let output = self.hotspot_center.get_output(&step.step, &Map::new()).await;
        let nested = output.get("analysis").and_then(|v| v.as_object()).cloned().unwrap_or_default();
        Ok(MetaStateIncrement {
            analysis: Some(nested),
            ..Default::default()
        })
    }

    async fn handle_evaluate(&self, state: &MetaState) -> Result<MetaStateIncrement> {
        let input: Value = serde_json::from_str(&state.user_input).unwrap_or(Value::Null);
        let brand = input.get("brand_name").and_then(|v| v.as_str()).unwrap_or("unspecified");
        let topic = input.get("topic").and_then(|v| v.as_str()).unwrap_or("unspecified");
        let analysis_summary = format!(
            "score {}; angle: {}; reason: {}",
            state.analysis.get("semantic_score").map(|v| v.to_string()).unwrap_or_default(),
            state.analysis.get("angle").and_then(|v| v.as_str()).unwrap_or(""),
            state.analysis.get("reason").and_then(|v| v.as_str()).unwrap_or(""),
        );
        let user_prompt = format!(
            "Brand: {brand}\nTopic: {topic}\nAnalysis: {analysis_summary}\n\nContent:\n{}\n\nProduce the evaluation JSON.",
            state.content
        );
        let messages = [ChatMessage::system(EVALUATION_SYSTEM_PROMPT), ChatMessage::user(user_prompt)];

        let evaluation = match self.router.invoke(&messages, "evaluation", Complexity::High).await {
            Ok(text) => parse_evaluation_json(&text).unwrap_or_else(|| default_evaluation("评估结果解析失败，已使用默认结果，主流程继续。")),
            Err(e) => {
                warn!(error = %e, "evaluation LLM call failed, using default evaluation");
                default_evaluation("评估服务暂时不可用，已使用默认结果，主流程继续。")
            }
        };

        let need_revision = if evaluation.get("evaluation_failed").and_then(|v| v.as_bool()) == Some(true) {
            false
        } else {
            let overall = evaluation.get("overall").and_then(|v| v.as_f64()).unwrap_or(0.0);
            overall.round() < 6.0
        };

        let mut evaluation = evaluation;
        if !evaluation.contains_key("overall_score") {
            let overall = evaluation.get("overall").and_then(|v| v.as_f64()).unwrap_or(0.0);
            evaluation.insert("overall_score".to_string(), Value::from(overall.round() as i64));
        }

        Ok(MetaStateIncrement {
            evaluation: Some(evaluation),
            need_revision: Some(need_revision),
            ..Default::default()
        })
    }

    async fn handle_unknown_step(&self, state: &MetaState, name: &str) -> Result<MetaStateIncrement> {
        match self.registry.get_workflow(name).await {
            Some(graph) => graph.run(state).await,
            None => Err(EngineError::ExecutionError(format!("未知模块: {name}，请注册对应插件或使用内置步骤"))),
        }
    }

    fn compile_report(&self, state: &MetaState, narrative: &str) -> String {
        let mut sections = vec!["# 深度思考报告".to_string(), String::new(), "## 思维链执行过程".to_string(), narrative.to_string()];

        sections.push(String::new());
        sections.push("## 最终输出".to_string());
        let final_output = if !state.content.trim().is_empty() {
            state.content.clone()
        } else {
            let angle = state.analysis.get("angle").and_then(|v| v.as_str()).unwrap_or("");
            let reason = state.analysis.get("reason").and_then(|v| v.as_str()).unwrap_or("");
            if angle.is_empty() && reason.is_empty() {
                "（暂无内容）".to_string()
            } else if reason.is_empty() {
                angle.to_string()
            } else {
                format!("{angle}\n\n{reason}")
            }
        };
        sections.push(final_output);

        let evaluation_failed = state.evaluation.get("evaluation_failed").and_then(|v| v.as_bool()) == Some(true);
        if !state.evaluation.is_empty() && !evaluation_failed {
            sections.push(String::new());
            sections.push("## 质量评估".to_string());
            let overall = state.evaluation.get("overall_score").map(|v| v.to_string()).unwrap_or_default();
            let suggestions = state.evaluation.get("suggestions").and_then(|v| v.as_str()).unwrap_or("");
            sections.push(format!("总分：{overall}\n建议：{suggestions}"));
        }

        sections.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelRoleConfig;
    use async_trait::async_trait;
    use noesis_core::ports::{KnowledgePort, SearchPort, SearchResult};
    use noesis_core::ports::{CaseTemplateService, DataLoopService, MethodologyService};
    use noesis_core::ports::{
        CtrPrediction, ImageAnalysisResult, MultimodalPort, PlatformRulesPort, PredictionPort, RuleSet, SampleLibraryPort,
        SampleRecord, VideoAnalysisResult, VideoContentStructure, VideoDecompositionPort, ViralPrediction,
    };
    use noesis_core::{Intent, StructuredData};
    use noesis_infra::cache::InMemoryCacheBackend;
    use noesis_infra::memory_repo::{InMemoryInteractionRepository, InMemoryProfileRepository};
    use std::collections::HashMap;

    struct StubLlmClient {
        plan_response: String,
        other_response: String,
    }

    #[async_trait]
    impl LlmClient for StubLlmClient {
        async fn complete(&self, role: &ModelRoleConfig, _messages: &[ChatMessage]) -> Result<String> {
            if role.model == "planner" {
                Ok(self.plan_response.clone())
            } else {
                Ok(self.other_response.clone())
            }
        }
    }

    struct StubSearchPort;
    #[async_trait]
    impl SearchPort for StubSearchPort {
        async fn search(&self, _query: &str, _num_results: usize, _search_type: &str) -> Result<Vec<SearchResult>> {
            Ok(vec![SearchResult { title: "t".into(), snippet: "s".into(), url: "u".into(), source: "src".into() }])
        }
    }

    struct StubKnowledgePort;
    #[async_trait]
    impl KnowledgePort for StubKnowledgePort {
        async fn retrieve(&self, _query: &str, _top_k: usize) -> Result<Vec<String>> {
            Ok(vec![])
        }
    }

    struct StubMultimodalPort;
    #[async_trait]
    impl MultimodalPort for StubMultimodalPort {
        async fn analyze_image(&self, _url_or_bytes: &str) -> Result<ImageAnalysisResult> {
            Ok(ImageAnalysisResult::default())
        }
        async fn analyze_video(&self, _url: &str) -> Result<VideoAnalysisResult> {
            Ok(VideoAnalysisResult::default())
        }
    }

    struct StubPredictionPort;
    #[async_trait]
    impl PredictionPort for StubPredictionPort {
        async fn predict_viral(&self, _features: &Value, _platform: &str) -> Result<ViralPrediction> {
            Ok(ViralPrediction::default())
        }
        async fn predict_ctr(&self, _cover_features: &Value, _title: &str, _platform: &str) -> Result<CtrPrediction> {
            Ok(CtrPrediction::default())
        }
    }

    struct StubVideoDecompositionPort;
    #[async_trait]
    impl VideoDecompositionPort for StubVideoDecompositionPort {
        async fn decompose(&self, _video_url: Option<&str>, _raw_text: Option<&str>, _platform: Option<&str>) -> Result<VideoContentStructure> {
            Ok(VideoContentStructure::default())
        }
    }

    struct StubSampleLibraryPort;
    #[async_trait]
    impl SampleLibraryPort for StubSampleLibraryPort {
        async fn ingest(&self, _samples: Vec<SampleRecord>, _batch_size: usize) -> Result<usize> {
            Ok(0)
        }
        async fn search(&self, _platform: Option<&str>, _category: Option<&str>, _top_k: usize) -> Result<Vec<SampleRecord>> {
            Ok(vec![])
        }
        async fn get_by_id(&self, _video_id: &str, _platform: Option<&str>) -> Result<Option<SampleRecord>> {
            Ok(None)
        }
    }

    struct StubPlatformRulesPort;
    #[async_trait]
    impl PlatformRulesPort for StubPlatformRulesPort {
        async fn get_rules(&self, _platform: &str) -> Result<RuleSet> {
            Ok(RuleSet::default())
        }
    }

    fn capabilities() -> Arc<Capabilities> {
        Arc::new(Capabilities {
            search: Arc::new(StubSearchPort),
            knowledge: Arc::new(StubKnowledgePort),
            multimodal: Arc::new(StubMultimodalPort),
            prediction: Arc::new(StubPredictionPort),
            video_decomposition: Arc::new(StubVideoDecompositionPort),
            sample_library: Arc::new(StubSampleLibraryPort),
            platform_rules: Arc::new(StubPlatformRulesPort),
            methodology: None::<Arc<dyn MethodologyService>>,
            case_template: None::<Arc<dyn CaseTemplateService>>,
            data_loop: None::<Arc<dyn DataLoopService>>,
        })
    }

    fn roles() -> HashMap<String, ModelRoleConfig> {
        let cfg = ModelRoleConfig {
            provider: "test".to_string(),
            model: "other".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        let mut roles = HashMap::new();
        for role in [crate::llm::ROLE_INTENT, crate::llm::ROLE_ANALYSIS, crate::llm::ROLE_EVALUATION] {
            roles.insert(role.to_string(), cfg.clone());
        }
        roles.insert(
            crate::llm::ROLE_STRATEGY.to_string(),
            ModelRoleConfig { model: "planner".to_string(), ..cfg },
        );
        roles
    }

    fn processed_input(raw: &str, explicit: bool) -> ProcessedInput {
        ProcessedInput {
            intent: Intent::FreeDiscussion,
            raw_query: raw.to_string(),
            command: None,
            structured_data: StructuredData::default(),
            explicit_content_request: explicit,
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
        }
    }

    fn orchestrator(plan_response: &str, other_response: &str) -> Orchestrator<StubLlmClient> {
        let client = StubLlmClient { plan_response: plan_response.to_string(), other_response: other_response.to_string() };
        let router = Arc::new(LlmRouter::new(client, roles()));
        let planner = Arc::new(StrategyPlanner::new(router.clone()));
        let memory = Arc::new(crate::memory_service::MemoryService::new(
            InMemoryProfileRepository::default(),
            InMemoryInteractionRepository::default(),
            Some(noesis_infra::cache::SmartCache::new(InMemoryCacheBackend::default())),
            0,
        )) as Arc<dyn MemoryPort>;
        let hotspot_center = Arc::new(PluginCenter::new("hotspot"));
        let analysis_graph = Arc::new(AnalysisSubGraph::new(router.clone(), Arc::new(PluginCenter::new("analysis")), Duration::from_secs(5), None, 0));
        let generation_graph = Arc::new(GenerationSubGraph::new(router.clone(), Arc::new(PluginCenter::new("generation")), Duration::from_secs(5)));
        let narrative = Arc::new(NarrativeSynthesizer::new(router.clone()));
        let registry = Arc::new(PluginRegistry::new());

        Orchestrator::new(
            planner,
            router,
            memory,
            capabilities(),
            hotspot_center,
            analysis_graph,
            generation_graph,
            narrative,
            registry,
            4,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn no_generate_plan_produces_strategy_report_without_generate_step() {
        let o = orchestrator(
            "[{\"step\": \"web_search\", \"params\": {}, \"reason\": \"r\"}, {\"step\": \"analyze\", \"params\": {}, \"reason\": \"r\"}]",
            "{\"angle\": \"聚焦年轻受众\", \"reason\": \"合适\", \"semantic_score\": 0.7}",
        );
        let state = o.run(&processed_input("推广华为手机，目标人群18-35岁", false), None, None).await;
        assert!(!state.plan.contains(STEP_GENERATE));
        assert_eq!(state.step_outputs.len(), 2);
        assert!(state.content.contains("# 深度思考报告"));
    }

    #[tokio::test]
    async fn failure_isolation_one_step_error_does_not_cancel_others() {
        let o = orchestrator(
            "[{\"step\": \"web_search\", \"params\": {}, \"reason\": \"r\"}, {\"step\": \"unregistered_step\", \"params\": {}, \"reason\": \"r\"}, {\"step\": \"analyze\", \"params\": {}, \"reason\": \"r\"}]",
            "{\"angle\": \"a\", \"reason\": \"r\", \"semantic_score\": 0.5}",
        );
        let state = o.run(&processed_input("test", false), None, None).await;
        assert_eq!(state.step_outputs.len(), 3);
        let failed = state.step_outputs.iter().find(|s| s.step == "unregistered_step").unwrap();
        assert!(failed.error.is_some());
        let analyzed = state.step_outputs.iter().find(|s| s.step == "analyze").unwrap();
        assert!(analyzed.error.is_none());
    }

    #[tokio::test]
    async fn evaluate_step_computes_need_revision_from_overall_score() {
        let o = orchestrator(
            "[{\"step\": \"analyze\", \"params\": {}, \"reason\": \"r\"}, {\"step\": \"generate\", \"params\": {}, \"reason\": \"r\"}, {\"step\": \"evaluate\", \"params\": {}, \"reason\": \"r\"}]",
            "{\"scores\": {\"consistency\": 4, \"creativity\": 3, \"safety\": 9, \"platform_fit\": 4}, \"overall\": 4.5, \"suggestions\": \"加强卖点\"}",
        );
        let state = o.run(&processed_input("帮我写一篇推广文案", true), None, None).await;
        assert!(state.need_revision);
    }
}
