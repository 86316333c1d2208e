//! Normalized intent produced by the Intent Processor.

use noesis_types::{SessionId, UserId};
use serde::{Deserialize, Serialize};

/// Classification of a single user utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    StructuredRequest,
    FreeDiscussion,
    CasualChat,
    DocumentQuery,
    Command,
}

/// Brand/product/topic fields extracted from the utterance or from
/// conversation context; any may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredData {
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub product_desc: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl StructuredData {
    pub fn is_empty(&self) -> bool {
        self.brand_name.is_none() && self.product_desc.is_none() && self.topic.is_none()
    }
}

/// The normalized, typed result of intent processing.
///
/// Invariant: when `intent == Intent::Command`, `command` is `Some` and
/// non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedInput {
    pub intent: Intent,
    pub raw_query: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub structured_data: StructuredData,
    pub explicit_content_request: bool,
    pub session_id: SessionId,
    pub user_id: UserId,
}

impl ProcessedInput {
    pub fn command(raw_query: String, command: String, session_id: SessionId, user_id: UserId) -> Self {
        Self {
            intent: Intent::Command,
            raw_query,
            command: Some(command),
            structured_data: StructuredData::default(),
            explicit_content_request: false,
            session_id,
            user_id,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self.intent {
            Intent::Command => self.command.as_deref().is_some_and(|c| !c.is_empty()),
            _ => true,
        }
    }
}

/// Output of the rule-based marketing-intent classifier (§4.7). Deterministic,
/// no I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketingClassification {
    pub is_marketing: bool,
    pub confidence: f64,
    pub reason: String,
    pub matched_categories: Vec<String>,
}
