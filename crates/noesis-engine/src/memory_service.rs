//! Memory Service (§4.2): assembles the layered prompt-shaped memory block
//! for one request, on top of the repository traits `noesis-core` defines
//! and the in-memory repositories `noesis-infra` ships.

use async_trait::async_trait;
use noesis_core::{ContextFingerprint, InteractionRepository, MemoryContext, ProfileRepository};
use noesis_infra::cache::{build_fingerprint_key, CacheBackend, SmartCache};
use noesis_types::Result;
use tracing::warn;

/// Object-safe seam over `MemoryService<P, I, B>` so the orchestrator can
/// hold one `Arc<dyn MemoryPort>` regardless of which repository/cache
/// types it was built with.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait MemoryPort: Send + Sync {
    async fn get_memory_for_analyze(
        &self,
        user_id: &str,
        brand_name: &str,
        product_desc: &str,
        topic: &str,
        tags_override: Option<&[String]>,
    ) -> Result<MemoryContext>;

    async fn get_recent_conversation_text(&self, user_id: &str, session_id: Option<&str>, limit: usize) -> String;

    async fn get_user_summary(&self, user_id: &str) -> String;
}

const RECENT_INTERACTIONS_LIMIT: usize = 5;

fn format_brand_facts(profile: &noesis_core::UserProfile) -> String {
    profile
        .brand_facts
        .iter()
        .map(|f| format!("  - {}", f.fact))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_success_cases(profile: &noesis_core::UserProfile) -> String {
    profile
        .success_cases
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, case)| {
            let mut lines = vec![format!("  {}. {}", i + 1, case.title)];
            if !case.description.is_empty() {
                lines.push(format!("     description: {}", truncate(&case.description, 200)));
            }
            if !case.outcome.is_empty() {
                lines.push(format!("     outcome: {}", truncate(&case.outcome, 150)));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max_chars).collect::<String>())
    }
}

/// Assembles a layered memory context for one request and exposes the two
/// auxiliary conversational views. Generic over the repository/cache
/// implementations so tests can swap in in-memory stand-ins.
pub struct MemoryService<P: ProfileRepository, I: InteractionRepository, B: CacheBackend> {
    profiles: P,
    interactions: I,
    cache: Option<SmartCache<B>>,
    memory_ttl_seconds: u64,
}

impl<P: ProfileRepository, I: InteractionRepository, B: CacheBackend> MemoryService<P, I, B> {
    pub fn new(profiles: P, interactions: I, cache: Option<SmartCache<B>>, memory_ttl_seconds: u64) -> Self {
        Self { profiles, interactions, cache, memory_ttl_seconds }
    }

    /// `get_recent_conversation_text`: chronological `用户:.../助手:...`
    /// transcript, biased to `session_id` when given.
    pub async fn get_recent_conversation_text(&self, user_id: &str, session_id: Option<&str>, limit: usize) -> String {
        if user_id.trim().is_empty() {
            return String::new();
        }
        let mut entries = match self.interactions.recent(user_id, session_id, limit).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(user_id, error = %e, "get_recent_conversation_text failed");
                return String::new();
            }
        };
        entries.reverse(); // newest-first -> chronological

        let mut parts = Vec::new();
        for entry in &entries {
            let raw = entry
                .user_input
                .get("raw_query")
                .or_else(|| entry.user_input.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim();
            if !raw.is_empty() {
                parts.push(format!("用户：{}", truncate(raw, 300)));
            }
            let out = entry.ai_output.trim();
            if !out.is_empty() {
                parts.push(format!("助手：{}", truncate(out, 300)));
            }
        }
        parts.join("\n")
    }

    /// `get_user_summary`: a single-line identity summary for casual replies.
    pub async fn get_user_summary(&self, user_id: &str) -> String {
        if user_id.trim().is_empty() {
            return String::new();
        }
        let profile = match self.profiles.get(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return String::new(),
            Err(e) => {
                warn!(user_id, error = %e, "get_user_summary failed");
                return String::new();
            }
        };

        let mut parts = Vec::new();
        if let Some(brand) = &profile.brand_name {
            parts.push(format!("品牌：{brand}"));
        }
        if let Some(industry) = &profile.industry {
            parts.push(format!("行业：{industry}"));
        }
        if let Some(style) = &profile.preferred_style {
            parts.push(format!("偏好风格：{style}"));
        }
        parts.join("；")
    }

    /// `get_memory_for_analyze`: the layered context used by the `analyze`
    /// step, cached by request fingerprint when a cache is configured.
    pub async fn get_memory_for_analyze(
        &self,
        user_id: &str,
        brand_name: &str,
        product_desc: &str,
        topic: &str,
        tags_override: Option<&[String]>,
    ) -> Result<MemoryContext> {
        match &self.cache {
            Some(cache) if self.memory_ttl_seconds > 0 => {
                let mut sorted_tags: Vec<String> = tags_override.unwrap_or(&[]).to_vec();
                sorted_tags.sort();
                let mut fingerprint = serde_json::Map::new();
                fingerprint.insert("user_id".to_string(), user_id.trim().into());
                fingerprint.insert("brand_name".to_string(), brand_name.trim().into());
                fingerprint.insert("product_desc".to_string(), product_desc.trim().into());
                fingerprint.insert("topic".to_string(), topic.trim().into());
                fingerprint.insert("tags".to_string(), sorted_tags.into());
                let key = build_fingerprint_key("memory:", &fingerprint);

                let (context, _hit) = cache
                    .get_or_set(&key, self.memory_ttl_seconds, || {
                        self.build_memory_context(user_id, tags_override)
                    })
                    .await?;
                Ok(context)
            }
            _ => self.build_memory_context(user_id, tags_override).await,
        }
    }

    async fn build_memory_context(&self, user_id: &str, tags_override: Option<&[String]>) -> Result<MemoryContext> {
        let mut effective_tags: Vec<String> = tags_override.filter(|t| !t.is_empty()).map(|t| t.to_vec()).unwrap_or_default();
        let mut fingerprint = ContextFingerprint::default();
        let mut parts = Vec::new();

        let profile = self.profiles.get(user_id).await?;
        if let Some(profile) = &profile {
            if effective_tags.is_empty() {
                effective_tags = profile.tags.clone();
            }
            fingerprint.tags = {
                let mut tags = effective_tags.clone();
                tags.sort();
                tags
            };

            let brand_facts = format_brand_facts(profile);
            if !brand_facts.is_empty() {
                parts.push("【品牌事实库】".to_string());
                parts.push(brand_facts);
                parts.push(String::new());
            }

            let success_cases = format_success_cases(profile);
            if !success_cases.is_empty() {
                parts.push("【成功案例库】".to_string());
                parts.push(success_cases);
                parts.push(String::new());
            }

            let mut profile_parts = Vec::new();
            if let Some(style) = &profile.preferred_style {
                profile_parts.push(format!("偏好风格：{style}"));
            }
            if let Some(industry) = &profile.industry {
                profile_parts.push(format!("行业：{industry}"));
            }
            if let Some(brand) = &profile.brand_name {
                profile_parts.push(format!("品牌：{brand}"));
            }
            let tags_to_show = if !effective_tags.is_empty() { &effective_tags } else { &profile.tags };
            if !tags_to_show.is_empty() {
                profile_parts.push(format!("兴趣标签：{}", tags_to_show.join("、")));
            }
            if !profile_parts.is_empty() {
                parts.push("【用户画像】".to_string());
                parts.extend(profile_parts);
                parts.push(String::new());
            }
        }

        let history = self.interactions.recent(user_id, None, RECENT_INTERACTIONS_LIMIT).await?;
        let mut recent_topics = Vec::new();
        if !history.is_empty() {
            parts.push("【近期交互（重要：用于延续用户偏好与主题，请优先参考）】".to_string());
            for (i, entry) in history.iter().enumerate() {
                let topic = entry.user_input.get("topic").and_then(|v| v.as_str()).unwrap_or("").trim();
                let brand = entry.user_input.get("brand_name").and_then(|v| v.as_str()).unwrap_or("").trim();
                let product = entry.user_input.get("product_desc").and_then(|v| v.as_str()).unwrap_or("").trim();
                let raw = entry.user_input.get("raw_query").and_then(|v| v.as_str()).unwrap_or("").trim();
                if !topic.is_empty() {
                    recent_topics.push(topic.to_string());
                }
                let summary = truncate(entry.ai_output.trim(), 150);

                let mut segment = format!("  {}. ", i + 1);
                if !brand.is_empty() || !product.is_empty() {
                    segment.push_str(&format!("品牌/产品：{brand} {product}；"));
                }
                if !topic.is_empty() || !raw.is_empty() {
                    segment.push_str(&format!("主题/需求：{}", if !topic.is_empty() { topic } else { raw }));
                }
                if !summary.is_empty() {
                    segment.push_str(&format!("；上次输出摘要：{summary}"));
                }
                parts.push(segment);
            }
            parts.push(String::new());
        }
        recent_topics.sort();
        recent_topics.dedup();
        fingerprint.recent_topics = recent_topics;

        Ok(MemoryContext {
            preference_context: parts.join("\n").trim().to_string(),
            context_fingerprint: fingerprint,
            effective_tags,
        })
    }
}

#[async_trait]
impl<P: ProfileRepository, I: InteractionRepository, B: CacheBackend> MemoryPort for MemoryService<P, I, B> {
    async fn get_memory_for_analyze(
        &self,
        user_id: &str,
        brand_name: &str,
        product_desc: &str,
        topic: &str,
        tags_override: Option<&[String]>,
    ) -> Result<MemoryContext> {
        MemoryService::get_memory_for_analyze(self, user_id, brand_name, product_desc, topic, tags_override).await
    }

    async fn get_recent_conversation_text(&self, user_id: &str, session_id: Option<&str>, limit: usize) -> String {
        MemoryService::get_recent_conversation_text(self, user_id, session_id, limit).await
    }

    async fn get_user_summary(&self, user_id: &str) -> String {
        MemoryService::get_user_summary(self, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_core::{BrandFact, InteractionHistory, SuccessCase, UserProfile};
    use noesis_infra::cache::InMemoryCacheBackend;
    use noesis_infra::memory_repo::{InMemoryInteractionRepository, InMemoryProfileRepository};

    fn service() -> MemoryService<InMemoryProfileRepository, InMemoryInteractionRepository, InMemoryCacheBackend> {
        MemoryService::new(InMemoryProfileRepository::default(), InMemoryInteractionRepository::default(), None, 0)
    }

    #[tokio::test]
    async fn empty_user_id_yields_empty_summary_and_transcript() {
        let svc = service();
        assert_eq!(svc.get_user_summary("").await, "");
        assert_eq!(svc.get_recent_conversation_text("", None, 5).await, "");
    }

    #[tokio::test]
    async fn summary_joins_present_fields_only() {
        let svc = service();
        let mut profile = UserProfile::new("u1".to_string());
        profile.brand_name = Some("Acme".to_string());
        profile.industry = Some("Coffee".to_string());
        svc.profiles.upsert(profile).await.unwrap();
        assert_eq!(svc.get_user_summary("u1").await, "品牌：Acme；行业：Coffee");
    }

    #[tokio::test]
    async fn memory_context_prioritizes_brand_facts_then_cases_then_profile() {
        let svc = service();
        let mut profile = UserProfile::new("u1".to_string());
        profile.brand_facts.push(BrandFact { fact: "founded 2020".to_string(), category: "history".to_string() });
        profile.success_cases.push(SuccessCase {
            title: "launch".to_string(),
            description: "d".to_string(),
            outcome: "2x growth".to_string(),
        });
        profile.tags = vec!["coffee".to_string(), "retail".to_string()];
        svc.profiles.upsert(profile).await.unwrap();

        let ctx = svc.get_memory_for_analyze("u1", "", "", "", None).await.unwrap();
        let brand_idx = ctx.preference_context.find("品牌事实库").unwrap();
        let cases_idx = ctx.preference_context.find("成功案例库").unwrap();
        let profile_idx = ctx.preference_context.find("用户画像").unwrap();
        assert!(brand_idx < cases_idx && cases_idx < profile_idx);
        assert_eq!(ctx.context_fingerprint.tags, vec!["coffee".to_string(), "retail".to_string()]);
    }

    #[tokio::test]
    async fn tags_override_wins_over_profile_tags() {
        let svc = service();
        let mut profile = UserProfile::new("u1".to_string());
        profile.tags = vec!["profile_tag".to_string()];
        svc.profiles.upsert(profile).await.unwrap();

        let override_tags = vec!["override_tag".to_string()];
        let ctx = svc.get_memory_for_analyze("u1", "", "", "", Some(&override_tags)).await.unwrap();
        assert_eq!(ctx.effective_tags, vec!["override_tag".to_string()]);
    }

    #[tokio::test]
    async fn recent_conversation_text_is_chronological() {
        let svc = service();
        for (query, output) in [("first", "reply one"), ("second", "reply two")] {
            svc.interactions
                .append(InteractionHistory {
                    user_id: "u1".to_string(),
                    session_id: "s1".to_string(),
                    user_input: serde_json::json!({"raw_query": query}),
                    ai_output: output.to_string(),
                    created_at: chrono::Utc::now(),
                    user_rating: None,
                    user_comment: None,
                })
                .await
                .unwrap();
        }
        let text = svc.get_recent_conversation_text("u1", None, 5).await;
        assert!(text.find("first").unwrap() < text.find("second").unwrap());
    }
}
