//! User memory domain types and repository abstractions (§3, §4.2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use noesis_types::{Result, SessionId, ThreadId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandFact {
    pub fact: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessCase {
    pub title: String,
    pub description: String,
    pub outcome: String,
}

/// Read-mostly view of a user's marketing profile, owned by an external
/// store; the core only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub preferred_style: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub brand_facts: Vec<BrandFact>,
    #[serde(default)]
    pub success_cases: Vec<SuccessCase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            brand_name: None,
            industry: None,
            preferred_style: None,
            tags: Vec::new(),
            brand_facts: Vec::new(),
            success_cases: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only record of one assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionHistory {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub user_input: serde_json::Value,
    pub ai_output: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user_rating: Option<i32>,
    #[serde(default)]
    pub user_comment: Option<String>,
}

/// A session record owned by an external KV store; indices are maintained
/// alongside it (`user -> threads`, `thread -> sessions`, newest-first,
/// bounded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub thread_id: ThreadId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub initial_data: serde_json::Map<String, serde_json::Value>,
}

/// Read-mostly access to user profiles.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>>;
    async fn upsert(&self, profile: UserProfile) -> Result<()>;
}

/// Append-only access to interaction history.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait InteractionRepository: Send + Sync {
    async fn append(&self, entry: InteractionHistory) -> Result<()>;

    /// Most recent `limit` interactions for a user, optionally biased to one
    /// session, newest-first.
    async fn recent(&self, user_id: &str, session_id: Option<&str>, limit: usize) -> Result<Vec<InteractionHistory>>;

    async fn record_feedback(&self, user_id: &str, session_id: &str, rating: Option<i32>, comment: Option<&str>) -> Result<()>;
}

/// Session/thread index access.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, record: SessionRecord) -> Result<()>;
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>>;
    async fn threads_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<ThreadId>>;
    async fn sessions_for_thread(&self, thread_id: &str, limit: usize) -> Result<Vec<SessionId>>;
}

/// The layered memory block assembled for one request (§4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryContext {
    pub preference_context: String,
    pub context_fingerprint: ContextFingerprint,
    pub effective_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextFingerprint {
    pub tags: Vec<String>,
    pub recent_topics: Vec<String>,
}
