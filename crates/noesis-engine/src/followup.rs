//! Follow-up Advisor (§4.12): an optional, at-most-one suggestion emitted
//! after compilation. Grounded on
//! `original_source/workflows/follow_up_suggestion.py`.

use crate::llm::{ChatMessage, Complexity, LlmClient, LlmRouter};
use noesis_core::PlanStep;
use tracing::warn;

const FOLLOWUP_SYSTEM_PROMPT: &str = "You are the assistant speaking after finishing one turn. Write a \
short, natural, conversational closing remark.\n\n\
If there is a natural next step the system could take (another generation pass, a deeper analysis), invite \
the user to it in one casual sentence, e.g. \"If you'd like, I can generate a version better suited for \
Bilibili.\" If this turn already reached its goal (content generated and evaluated, nothing pending), give a \
brief closing remark only, e.g. \"This is ready to go — let me know if you need anything else.\"\n\n\
STEP marker (system-only): if you are inviting a next step, end your reply with its own line containing only \
\"STEP: generate\" or \"STEP: analyze\". This line is never shown to the user, so it must be alone on its own \
line. Omit it entirely when this turn has reached a terminal point.";

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

fn parse_step_from_response(text: &str) -> (String, String) {
    if text.trim().is_empty() {
        return (String::new(), String::new());
    }

    let mut step_name = String::new();
    let mut rest_lines = Vec::new();

    for line in text.trim().lines() {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();
        if upper.starts_with("STEP:") {
            step_name = trimmed[5..].trim().to_lowercase();
            continue;
        }
        // Trailing-same-line form: "... STEP: generate" at the end of a line.
        if let Some(idx) = upper.rfind("STEP:") {
            let candidate = trimmed[idx + 5..].trim().to_lowercase();
            if candidate == "generate" || candidate == "analyze" {
                step_name = candidate;
                rest_lines.push(trimmed[..idx].trim().to_string());
                continue;
            }
        }
        rest_lines.push(trimmed.to_string());
    }

    let rest = rest_lines.join("\n").trim().to_string();
    if step_name != "generate" && step_name != "analyze" {
        step_name = if rest.is_empty() { String::new() } else { "generate".to_string() };
    }
    (rest, step_name)
}

fn build_user_prompt(intent: &str, plan: &[PlanStep], content_preview: &str) -> String {
    let steps_done: Vec<&str> = plan.iter().map(|s| s.step.as_str()).collect();
    let preview = if content_preview.is_empty() { "none".to_string() } else { truncate(content_preview, 400) };
    format!(
        "User intent: {}\nSteps executed this turn: {}\nOutput preview: {}\n\n\
        Write the closing remark per the rules above.",
        if intent.is_empty() { "unspecified" } else { intent },
        if steps_done.is_empty() { "none".to_string() } else { steps_done.join(", ") },
        preview,
    )
}

/// A parsed follow-up suggestion. `step` is `""` for a terminal remark with
/// no actionable next step.
#[derive(Debug, Clone, Default)]
pub struct FollowUpSuggestion {
    pub text: String,
    pub step: String,
}

/// Emits at most one follow-up suggestion per turn, parsing the `STEP:`
/// marker out of the model's response.
pub struct FollowUpAdvisor<C: LlmClient> {
    router: std::sync::Arc<LlmRouter<C>>,
}

impl<C: LlmClient> FollowUpAdvisor<C> {
    pub fn new(router: std::sync::Arc<LlmRouter<C>>) -> Self {
        Self { router }
    }

    pub async fn suggest(&self, intent: &str, plan: &[PlanStep], content_preview: &str) -> FollowUpSuggestion {
        let user_prompt = build_user_prompt(intent, plan, content_preview);
        let messages = [ChatMessage::system(FOLLOWUP_SYSTEM_PROMPT), ChatMessage::user(user_prompt)];

        let text = match self.router.invoke(&messages, "chat_reply", Complexity::Low).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "follow-up advisor LLM call failed, suppressing suggestion");
                return FollowUpSuggestion::default();
            }
        };

        if text.trim().chars().count() < 10 {
            return FollowUpSuggestion::default();
        }

        let (body, step) = parse_step_from_response(&text);
        if body.chars().count() < 5 {
            return FollowUpSuggestion::default();
        }

        FollowUpSuggestion { text: body, step }
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

    fn advisor(response: &str) -> FollowUpAdvisor<StubLlmClient> {
        let cfg = ModelRoleConfig {
            provider: "test".to_string(),
            model: "test".to_string(),
            temperature: 0.3,
            max_tokens: 256,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        let mut roles = HashMap::new();
        roles.insert(crate::llm::ROLE_INTENT.to_string(), cfg.clone());
        roles.insert(crate::llm::ROLE_STRATEGY.to_string(), cfg);
        FollowUpAdvisor::new(std::sync::Arc::new(LlmRouter::new(StubLlmClient { response: response.to_string() }, roles)))
    }

    #[test]
    fn parses_step_on_its_own_line() {
        let (body, step) = parse_step_from_response("这是建议文本\nSTEP: generate");
        assert_eq!(body, "这是建议文本");
        assert_eq!(step, "generate");
    }

    #[test]
    fn parses_step_trailing_last_line_case_insensitive() {
        let (body, step) = parse_step_from_response("这是建议文本 step: analyze");
        assert_eq!(body, "这是建议文本");
        assert_eq!(step, "analyze");
    }

    #[test]
    fn defaults_to_generate_when_body_present_but_no_step_marker() {
        let (body, step) = parse_step_from_response("本次内容已就绪，有新需求随时说。");
        assert_eq!(body, "本次内容已就绪，有新需求随时说。");
        assert_eq!(step, "generate");
    }

    #[test]
    fn empty_input_yields_empty_body_and_step() {
        let (body, step) = parse_step_from_response("");
        assert_eq!(body, "");
        assert_eq!(step, "");
    }

    #[tokio::test]
    async fn short_response_suppresses_suggestion() {
        let a = advisor("ok");
        let suggestion = a.suggest("free_discussion", &[], "").await;
        assert_eq!(suggestion.text, "");
        assert_eq!(suggestion.step, "");
    }

    #[tokio::test]
    async fn full_response_parses_text_and_step() {
        let a = advisor("如果你愿意，我可以帮你再生成一版更适合 B 站的文案。\nSTEP: generate");
        let suggestion = a.suggest("structured_request", &[], "已生成文案预览").await;
        assert_eq!(suggestion.step, "generate");
        assert!(suggestion.text.contains("B 站"));
    }

    #[tokio::test]
    async fn llm_failure_suppresses_suggestion() {
        struct AlwaysFails;
        #[async_trait]
        impl LlmClient for AlwaysFails {
            async fn complete(&self, _role: &ModelRoleConfig, _messages: &[ChatMessage]) -> noesis_types::Result<String> {
                Err(noesis_types::EngineError::NetworkError("down".to_string()))
            }
        }
        let cfg = ModelRoleConfig {
            provider: "test".to_string(),
            model: "test".to_string(),
            temperature: 0.3,
            max_tokens: 256,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        let mut roles = HashMap::new();
        roles.insert(crate::llm::ROLE_INTENT.to_string(), cfg.clone());
        roles.insert(crate::llm::ROLE_STRATEGY.to_string(), cfg);
        let a = FollowUpAdvisor::new(std::sync::Arc::new(LlmRouter::new(AlwaysFails, roles)));
        let suggestion = a.suggest("free_discussion", &[], "").await;
        assert_eq!(suggestion.text, "");
    }
}
