//! Narrative Synthesizer (§4.11): turns one invocation's thinking log into a
//! first-person narration for the final report. Grounded on
//! `original_source/workflows/thinking_narrative.py`.

use crate::llm::{ChatMessage, Complexity, LlmClient, LlmRouter};
use noesis_core::{MetaState, StepOutput, ThinkingLogEntry};
use tracing::warn;

const NARRATIVE_SYSTEM_PROMPT: &str = "You write the thinking-process narration for a marketing-strategy \
assistant. Given the execution record, write one coherent first-person narration (\"I ...\").\n\n\
Requirements:\n\
1. Use a first-person subject throughout (\"I plan to...\", \"Based on the search results...\").\n\
2. Explain the reasoning chain: why these steps, how the information was combined, how the conclusion follows.\n\
3. If web search ran, mention how many pages were read and what sources contributed.\n\
4. If reference material (uploaded documents/links) was present, call it out as supplementary only — the \
user's stated topic always leads, reference material never overrides it.\n\
5. If preference tags are present, naturally mention acting on the user's preferences.\n\
6. Write naturally; never mechanically list step names.\n\
7. Output 200-600 characters, no more.";

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

fn build_user_prompt(
    state: &MetaState,
    thinking_logs: &[ThinkingLogEntry],
    step_outputs: &[StepOutput],
    effective_tags: &[String],
    has_reference: bool,
) -> String {
    let input: serde_json::Value = serde_json::from_str(&state.user_input).unwrap_or(serde_json::Value::Null);
    let brand = input.get("brand_name").and_then(|v| v.as_str()).unwrap_or("");
    let product = input.get("product_desc").and_then(|v| v.as_str()).unwrap_or("");
    let topic = input.get("topic").and_then(|v| v.as_str()).unwrap_or("");

    let mut steps_desc = Vec::new();
    for (i, entry) in thinking_logs.iter().enumerate() {
        steps_desc.push(format!("- {}: {}", entry.step, entry.thought));
        if let Some(output) = step_outputs.get(i) {
            if let Some(result) = &output.result {
                steps_desc.push(format!("  result summary: {}", truncate(&result.to_string(), 150)));
            }
        }
    }

    let search_preview = truncate(&state.search_context, 800);
    let analysis_preview = if state.analysis.is_empty() {
        String::new()
    } else {
        format!(
            "semantic score {}, angle: {}",
            state.analysis.get("semantic_score").map(|v| v.to_string()).unwrap_or_default(),
            state.analysis.get("angle").and_then(|v| v.as_str()).unwrap_or(""),
        )
    };

    let tags_display = if effective_tags.is_empty() { "none".to_string() } else { effective_tags.join(", ") };

    format!(
        "User goal:\nBrand: {}\nProduct: {}\nTopic: {}\n\n\
        Execution record:\n{}\n\n\
        Web search summary (if any):\n{}\n\n\
        Analysis summary:\n{}\n\n\
        Reference material present: {}\n\n\
        Preference tags: {}\n\n\
        Write the thinking-process narration.",
        if brand.is_empty() { "unspecified" } else { brand },
        if product.is_empty() { "unspecified" } else { product },
        if topic.is_empty() { "unspecified" } else { topic },
        steps_desc.join("\n"),
        if search_preview.is_empty() { "(none)" } else { &search_preview },
        if analysis_preview.is_empty() { "(none)" } else { &analysis_preview },
        if has_reference { "yes, used as supplementary material" } else { "no" },
        tags_display,
    )
}

fn bullet_fallback(thinking_logs: &[ThinkingLogEntry]) -> String {
    let lines: Vec<String> = thinking_logs
        .iter()
        .filter(|e| !e.step.is_empty() || !e.thought.is_empty())
        .map(|e| format!("- **{}**: {}", e.step, e.thought))
        .collect();
    if lines.is_empty() {
        "（无详细记录）".to_string()
    } else {
        lines.join("\n")
    }
}

/// Synthesizes the first-person thinking narration for one invocation, via
/// the lightweight `thinking_narrative` model role, with a bullet-list
/// fallback on failure or an implausibly short response.
pub struct NarrativeSynthesizer<C: LlmClient> {
    router: std::sync::Arc<LlmRouter<C>>,
}

impl<C: LlmClient> NarrativeSynthesizer<C> {
    pub fn new(router: std::sync::Arc<LlmRouter<C>>) -> Self {
        Self { router }
    }

    pub async fn synthesize(&self, state: &MetaState, has_reference: bool) -> String {
        if state.thinking_logs.is_empty() {
            return bullet_fallback(&state.thinking_logs);
        }

        let user_prompt = build_user_prompt(state, &state.thinking_logs, &state.step_outputs, &state.effective_tags, has_reference);
        let messages = [ChatMessage::system(NARRATIVE_SYSTEM_PROMPT), ChatMessage::user(user_prompt)];

        match self.router.invoke(&messages, "chat_reply", Complexity::Low).await {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.chars().count() > 50 {
                    trimmed.to_string()
                } else {
                    warn!("narrative synthesizer response too short, using bullet fallback");
                    bullet_fallback(&state.thinking_logs)
                }
            }
            Err(e) => {
                warn!(error = %e, "narrative synthesizer LLM call failed, using bullet fallback");
                bullet_fallback(&state.thinking_logs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelRoleConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StubLlmClient {
        response: String,
    }

    #[async_trait]
    impl LlmClient for StubLlmClient {
        async fn complete(&self, _role: &ModelRoleConfig, _messages: &[ChatMessage]) -> noesis_types::Result<String> {
            Ok(self.response.clone())
        }
    }

    fn synthesizer(response: &str) -> NarrativeSynthesizer<StubLlmClient> {
        let cfg = ModelRoleConfig {
            provider: "test".to_string(),
            model: "test".to_string(),
            temperature: 0.3,
            max_tokens: 512,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        let mut roles = HashMap::new();
        roles.insert(crate::llm::ROLE_INTENT.to_string(), cfg.clone());
        roles.insert(crate::llm::ROLE_STRATEGY.to_string(), cfg);
        NarrativeSynthesizer::new(std::sync::Arc::new(LlmRouter::new(StubLlmClient { response: response.to_string() }, roles)))
    }

    #[tokio::test]
    async fn empty_thinking_logs_return_literal_placeholder() {
        let synth = synthesizer("irrelevant");
        let state = MetaState::new("{}".to_string(), "s".to_string(), "u".to_string());
        assert_eq!(synth.synthesize(&state, false).await, "（无详细记录）");
    }

    #[tokio::test]
    async fn short_llm_response_falls_back_to_bullets() {
        let synth = synthesizer("too short");
        let mut state = MetaState::new("{}".to_string(), "s".to_string(), "u".to_string());
        state.append_thought("web_search", "looked up competitor campaigns");
        let narration = synth.synthesize(&state, false).await;
        assert!(narration.starts_with("- **web_search**"));
    }

    #[tokio::test]
    async fn long_enough_llm_response_is_used_verbatim() {
        let long_response = "我".to_string() + &"根据检索到的信息分析了品牌定位，".repeat(10);
        let synth = synthesizer(&long_response);
        let mut state = MetaState::new("{}".to_string(), "s".to_string(), "u".to_string());
        state.append_thought("analyze", "correlated brand with hotspot");
        let narration = synth.synthesize(&state, false).await;
        assert_eq!(narration, long_response.trim());
    }
}
