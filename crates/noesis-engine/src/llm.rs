//! LLM Router (§4.3): task/complexity → model-role selection, with a
//! one-shot fallback on failure. The only path by which other components
//! call an external LLM.

use async_trait::async_trait;
use noesis_types::{EngineError, Result};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

pub const ROLE_INTENT: &str = "intent";
pub const ROLE_STRATEGY: &str = "strategy";
pub const ROLE_EVALUATION: &str = "evaluation";
pub const ROLE_ANALYSIS: &str = "analysis";

/// One chat message in the conversation sent to a model.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Request complexity, used by `resolve_role` to pick a default role when
/// the caller doesn't name one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Low,
    High,
}

/// `(task_type, complexity) -> role` per §4.3: `chat_reply -> intent`,
/// `planning -> strategy`, `evaluation -> evaluation`, `analysis ->
/// analysis`, default per complexity (`high -> strategy`, else `intent`).
pub fn resolve_role(task_type: &str, complexity: Complexity) -> &'static str {
    match task_type {
        "chat_reply" => ROLE_INTENT,
        "planning" => ROLE_STRATEGY,
        "evaluation" => ROLE_EVALUATION,
        "analysis" => ROLE_ANALYSIS,
        _ => match complexity {
            Complexity::High => ROLE_STRATEGY,
            Complexity::Low => ROLE_INTENT,
        },
    }
}

fn fallback_role(role: &str) -> Option<&'static str> {
    match role {
        ROLE_STRATEGY => Some(ROLE_INTENT),
        ROLE_INTENT => Some(ROLE_STRATEGY),
        _ => None,
    }
}

/// Per-role model configuration, loaded at startup from the layered
/// configuration (§10.3).
#[derive(Debug, Clone)]
pub struct ModelRoleConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub base_url: String,
    pub api_key_env: String,
}

/// A client able to complete a chat request for one role. The HTTP
/// transport to whichever OpenAI-compatible endpoint a role names is
/// `reqwest`-based and provider-agnostic; it never special-cases a vendor,
/// only a role name.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, role: &ModelRoleConfig, messages: &[ChatMessage]) -> Result<String>;
}

/// `reqwest`-based client against an OpenAI-compatible chat-completions
/// endpoint.
#[derive(Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
}

impl Default for HttpLlmClient {
    fn default() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, role: &ModelRoleConfig, messages: &[ChatMessage]) -> Result<String> {
        let api_key = std::env::var(&role.api_key_env)
            .map_err(|_| EngineError::ConfigError(format!("missing API key env var: {}", role.api_key_env)))?;

        let body = serde_json::json!({
            "model": role.model,
            "temperature": role.temperature,
            "max_tokens": role.max_tokens,
            "messages": messages.iter().map(|m| serde_json::json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", role.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::NetworkError(format!("LLM request failed: {e}")))?;

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::ParseError(format!("LLM response malformed: {e}")))?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| EngineError::ParseError("LLM response missing choices[0].message.content".to_string()))
    }
}

/// Resolves a role name to a client/config pair and calls the role,
/// falling back once to the opposite of strategy/intent on any failure
/// (§4.3).
pub struct LlmRouter<C: LlmClient> {
    client: C,
    roles: HashMap<String, ModelRoleConfig>,
}

impl<C: LlmClient> LlmRouter<C> {
    pub fn new(client: C, roles: HashMap<String, ModelRoleConfig>) -> Self {
        Self { client, roles }
    }

    fn role_config(&self, role: &str) -> Result<&ModelRoleConfig> {
        self.roles
            .get(role)
            .ok_or_else(|| EngineError::ConfigError(format!("no model role configured: {role}")))
    }

    pub async fn invoke(&self, messages: &[ChatMessage], task_type: &str, complexity: Complexity) -> Result<String> {
        let role = resolve_role(task_type, complexity);
        let role_config = self.role_config(role)?;

        match self.client.complete(role_config, messages).await {
            Ok(text) => Ok(text),
            Err(primary_err) => {
                let Some(fallback) = fallback_role(role) else {
                    return Err(primary_err);
                };
                warn!(role, fallback, error = %primary_err, "primary LLM role failed, trying fallback role once");
                let fallback_config = self.role_config(fallback)?;
                self.client.complete(fallback_config, messages).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn role_config() -> ModelRoleConfig {
        ModelRoleConfig {
            provider: "test".to_string(),
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens: 256,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_API_KEY".to_string(),
        }
    }

    struct FailNTimesClient {
        failures_remaining: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmClient for FailNTimesClient {
        async fn complete(&self, _role: &ModelRoleConfig, _messages: &[ChatMessage]) -> Result<String> {
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(EngineError::NetworkError("simulated failure".to_string()));
            }
            Ok("ok".to_string())
        }
    }

    #[test]
    fn role_resolution_matches_table() {
        assert_eq!(resolve_role("chat_reply", Complexity::Low), ROLE_INTENT);
        assert_eq!(resolve_role("planning", Complexity::Low), ROLE_STRATEGY);
        assert_eq!(resolve_role("evaluation", Complexity::High), ROLE_EVALUATION);
        assert_eq!(resolve_role("unknown", Complexity::High), ROLE_STRATEGY);
        assert_eq!(resolve_role("unknown", Complexity::Low), ROLE_INTENT);
    }

    #[tokio::test]
    async fn falls_back_once_then_propagates_if_fallback_also_fails() {
        let mut roles = HashMap::new();
        roles.insert(ROLE_STRATEGY.to_string(), role_config());
        roles.insert(ROLE_INTENT.to_string(), role_config());
        let client = FailNTimesClient { failures_remaining: Arc::new(AtomicU32::new(2)) };
        let router = LlmRouter::new(client, roles);
        let result = router.invoke(&[ChatMessage::user("hi")], "planning", Complexity::Low).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn succeeds_via_fallback_after_one_failure() {
        let mut roles = HashMap::new();
        roles.insert(ROLE_STRATEGY.to_string(), role_config());
        roles.insert(ROLE_INTENT.to_string(), role_config());
        let client = FailNTimesClient { failures_remaining: Arc::new(AtomicU32::new(1)) };
        let router = LlmRouter::new(client, roles);
        let result = router.invoke(&[ChatMessage::user("hi")], "planning", Complexity::Low).await;
        assert_eq!(result.unwrap(), "ok");
    }
}
