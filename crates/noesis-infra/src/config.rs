//! Layered configuration (§10.3): compiled-in defaults, overridable by an
//! optional TOML file, overridable by environment variables.

use noesis_types::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub memory: MemoryConfig,
    pub orchestrator: OrchestratorConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
}

/// Smart Cache TTL policy (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    pub ttl_ai_default_seconds: u64,
    pub ttl_analysis_with_plugins_seconds: u64,
    pub ttl_retrieval_seconds: u64,
    pub ttl_memory_seconds: u64,
    pub ttl_profile_seconds: u64,
    pub ttl_hotspot_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub recent_interaction_limit: usize,
}

/// Orchestrator resource bounds (§5 backpressure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub max_concurrent_capability_calls: usize,
    pub default_step_timeout_seconds: u64,
    pub max_plan_steps: usize,
}

/// Per-role model settings, layered the same way as the rest of
/// `EngineConfig`. Kept as plain data here rather than in `noesis-engine`
/// (which depends on this crate, not the other way around); callers
/// convert each entry into a `noesis_engine::llm::ModelRoleConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRoleSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub base_url: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub default_timeout_seconds: u64,
    pub roles: HashMap<String, ModelRoleSettings>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            memory: MemoryConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_ai_default_seconds: 3600,
            ttl_analysis_with_plugins_seconds: 300,
            ttl_retrieval_seconds: 3600,
            ttl_memory_seconds: 3600,
            ttl_profile_seconds: 300,
            ttl_hotspot_seconds: 21600,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recent_interaction_limit: 5,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_capability_calls: 8,
            default_step_timeout_seconds: 90,
            max_plan_steps: 6,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        let default_role = |model: &str| ModelRoleSettings {
            provider: "openai".to_string(),
            model: model.to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "NOESIS_LLM_API_KEY".to_string(),
        };
        let mut roles = HashMap::new();
        roles.insert("intent".to_string(), default_role("gpt-4o-mini"));
        roles.insert("strategy".to_string(), default_role("gpt-4o"));
        roles.insert("analysis".to_string(), default_role("gpt-4o"));
        roles.insert("evaluation".to_string(), default_role("gpt-4o-mini"));
        Self {
            default_timeout_seconds: 30,
            roles,
        }
    }
}

impl EngineConfig {
    /// Load defaults, then an optional TOML file, then environment
    /// variable overrides, via the `config` crate's layered builder.
    pub fn load(file_path: Option<&str>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults).map_err(|e| EngineError::ConfigError(e.to_string()))?,
        );

        if let Some(path) = file_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix("NOESIS").separator("__"));

        let merged: Self = builder
            .build()
            .map_err(|e| EngineError::ConfigError(e.to_string()))?
            .try_deserialize()
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;

        merged.validate()?;
        Ok(merged)
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = env::var("NOESIS_CACHE_REDIS_URL") {
            config.cache.redis_url = Some(url);
        }
        if let Ok(port) = env::var("NOESIS_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| EngineError::ConfigError("invalid NOESIS_SERVER_PORT".to_string()))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(EngineError::ConfigError("server port must be > 0".to_string()));
        }
        if self.orchestrator.max_plan_steps == 0 || self.orchestrator.max_plan_steps > 6 {
            return Err(EngineError::ConfigError(
                "orchestrator.max_plan_steps must be in 1..=6".to_string(),
            ));
        }
        if self.orchestrator.max_concurrent_capability_calls == 0 {
            return Err(EngineError::ConfigError(
                "orchestrator.max_concurrent_capability_calls must be > 0".to_string(),
            ));
        }
        for role in ["intent", "strategy", "analysis", "evaluation"] {
            if !self.llm.roles.contains_key(role) {
                return Err(EngineError::ConfigError(format!("llm.roles missing required role: {role}")));
            }
        }
        Ok(())
    }
}
