//! Strategy Planner (§4.8): chain-of-thought step planning before the
//! orchestrator executes it.

use crate::llm::{ChatMessage, Complexity, LlmClient, LlmRouter};
use noesis_core::{default_plan, Plan, PlanStep, ProcessedInput};
use tracing::{info, warn};

const PLANNER_SYSTEM_PROMPT: &str = "You are a strategy-planning expert. Given the user's conversational \
intent, plan a chain of thought from analysis to execution.\n\n\
Available modules (extensible: a custom plugin registered under a step name becomes dispatchable):\n\
- web_search: web lookup for competitors, hotspots, industry trends, general facts\n\
- memory_query: query the user's long-term preferences and brand facts\n\
- <platform>_hotspot (e.g. bilibili_hotspot): platform hotspot ranking, used only when the user names that platform\n\
- analyze: marketing analysis (brand × hotspot correlation) or general question analysis\n\
- generate: generate content (copy, script, ...); params may include platform/output_type\n\
- evaluate: evaluate generated content quality\n\n\
Planning rules:\n\
1. Plan steps from the user's actual intent; not every request needs the full pipeline.\n\
2. Only include generate when the user explicitly asked for produced content. If the user is only stating an intent or audience, never plan generate — produce strategy/analysis instead.\n\
3. Marketing intent without explicit generation: web_search + memory_query + analyze.\n\
4. Marketing intent with explicit generation: web_search + memory_query + analyze + generate + evaluate.\n\
5. When the user names a platform for generated content, add that platform's hotspot step before analyze.\n\
6. Prefer 2-6 steps.\n\n\
Output exactly one JSON array, each entry: {\"step\": \"...\", \"params\": {...}, \"reason\": \"one sentence\"}. \
Output nothing but the JSON array.";

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

fn parse_plan_json(raw: &str) -> Option<Vec<PlanStep>> {
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
    serde_json::from_str::<Vec<PlanStep>>(trimmed).ok()
}

/// Builds the user-facing half of the planning prompt from a processed
/// input and optional conversation context.
fn build_user_prompt(input: &ProcessedInput, conversation_context: Option<&str>) -> String {
    let sd = &input.structured_data;
    let brand = sd.brand_name.as_deref().unwrap_or("unspecified");
    let product = sd.product_desc.as_deref().unwrap_or("unspecified");
    let topic = sd.topic.as_deref().unwrap_or(if input.raw_query.is_empty() { "promotion" } else { &input.raw_query });

    let ctx_section = match conversation_context.filter(|c| !c.trim().is_empty()) {
        Some(ctx) => format!("\nRecent conversation:\n{}\n", truncate(ctx, 600)),
        None => String::new(),
    };

    let explicit_hint = if input.explicit_content_request {
        "The user explicitly asked for generated content; a generate step may be planned."
    } else {
        "The user did NOT explicitly ask for generated content; never plan a generate step. Output strategy/analysis instead."
    };

    format!(
        "User goal (the subject every later step must orbit):\n\
        Brand: {brand}\n\
        Product: {product}\n\
        Topic/goal: {topic}\n\
        Explicit content request: {}\n{ctx_section}\n{explicit_hint}\n\n\
        Plan the execution steps.",
        if input.explicit_content_request { "yes" } else { "no" },
    )
}

/// Plans a chain-of-thought step sequence for one processed input, with a
/// defensive JSON parse and the two explicit-content-request-dependent
/// fallback plans on failure.
pub struct StrategyPlanner<C: LlmClient> {
    router: std::sync::Arc<LlmRouter<C>>,
}

impl<C: LlmClient> StrategyPlanner<C> {
    pub fn new(router: std::sync::Arc<LlmRouter<C>>) -> Self {
        Self { router }
    }

    pub async fn plan(&self, input: &ProcessedInput, conversation_context: Option<&str>) -> Plan {
        let user_prompt = build_user_prompt(input, conversation_context);
        let messages = [ChatMessage::system(PLANNER_SYSTEM_PROMPT), ChatMessage::user(user_prompt)];

        let mut plan = match self.router.invoke(&messages, "planning", Complexity::High).await {
            Ok(text) => match parse_plan_json(&text) {
                Some(steps) if !steps.is_empty() => Plan::new(steps, None),
                _ => {
                    warn!("strategy planner returned an empty or unparseable plan, using default");
                    default_plan(input.explicit_content_request)
                }
            },
            Err(e) => {
                warn!(error = %e, "strategy planner LLM call failed, using default plan");
                default_plan(input.explicit_content_request)
            }
        };

        if plan.strip_generate_unless_explicit(input.explicit_content_request) {
            info!("strategy planner: dropped generate step(s), explicit_content_request=false");
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_core::{Intent, StructuredData};
    use noesis_types::Result;

    struct StubLlmClient {
        response: String,
    }

    #[async_trait::async_trait]
    impl LlmClient for StubLlmClient {
        async fn complete(&self, _role: &crate::llm::ModelRoleConfig, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    fn planner(response: &str) -> StrategyPlanner<StubLlmClient> {
        let mut roles = std::collections::HashMap::new();
        let cfg = crate::llm::ModelRoleConfig {
            provider: "test".to_string(),
            model: "test".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        roles.insert(crate::llm::ROLE_STRATEGY.to_string(), cfg.clone());
        roles.insert(crate::llm::ROLE_INTENT.to_string(), cfg);
        let client = StubLlmClient { response: response.to_string() };
        StrategyPlanner::new(std::sync::Arc::new(LlmRouter::new(client, roles)))
    }

    fn processed_input(explicit: bool) -> ProcessedInput {
        ProcessedInput {
            intent: Intent::FreeDiscussion,
            raw_query: "promote our new product".to_string(),
            command: None,
            structured_data: StructuredData::default(),
            explicit_content_request: explicit,
            session_id: "s".to_string(),
            user_id: "u".to_string(),
        }
    }

    #[tokio::test]
    async fn parses_valid_plan_json() {
        let p = planner("```json\n[{\"step\": \"web_search\", \"params\": {}, \"reason\": \"market facts\"}, {\"step\": \"analyze\", \"params\": {}, \"reason\": \"correlate\"}]\n```");
        let plan = p.plan(&processed_input(false), None).await;
        assert_eq!(plan.len(), 2);
        assert!(plan.contains("web_search"));
    }

    #[tokio::test]
    async fn strips_generate_when_not_explicit_even_if_model_includes_it() {
        let p = planner("[{\"step\": \"analyze\", \"params\": {}, \"reason\": \"r\"}, {\"step\": \"generate\", \"params\": {}, \"reason\": \"r\"}]");
        let plan = p.plan(&processed_input(false), None).await;
        assert!(!plan.contains("generate"));
    }

    #[tokio::test]
    async fn keeps_generate_when_explicit() {
        let p = planner("[{\"step\": \"analyze\", \"params\": {}, \"reason\": \"r\"}, {\"step\": \"generate\", \"params\": {}, \"reason\": \"r\"}]");
        let plan = p.plan(&processed_input(true), None).await;
        assert!(plan.contains("generate"));
    }

    #[tokio::test]
    async fn unparseable_response_falls_back_to_default_plan() {
        let p = planner("not json at all");
        let plan = p.plan(&processed_input(false), None).await;
        assert_eq!(plan.steps[0].step, "web_search");
    }

    #[tokio::test]
    async fn unparseable_response_falls_back_to_generate_default_when_explicit() {
        let p = planner("garbage");
        let plan = p.plan(&processed_input(true), None).await;
        assert!(plan.contains("generate"));
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_default_plan() {
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl LlmClient for AlwaysFails {
            async fn complete(&self, _role: &crate::llm::ModelRoleConfig, _messages: &[ChatMessage]) -> Result<String> {
                Err(noesis_types::EngineError::NetworkError("down".to_string()))
            }
        }
        let mut roles = std::collections::HashMap::new();
        let cfg = crate::llm::ModelRoleConfig {
            provider: "test".to_string(),
            model: "test".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        roles.insert(crate::llm::ROLE_STRATEGY.to_string(), cfg.clone());
        roles.insert(crate::llm::ROLE_INTENT.to_string(), cfg);
        let p = StrategyPlanner::new(std::sync::Arc::new(LlmRouter::new(AlwaysFails, roles)));
        let plan = p.plan(&processed_input(false), None).await;
        assert!(!plan.is_empty());
    }
}
