//! In-memory repository implementations (§4.2). These stand in for the
//! relational store this engine treats as external (§1); the seam is the
//! trait, so a real adapter can replace these without touching the Memory
//! Service.

use async_trait::async_trait;
use noesis_core::{InteractionHistory, InteractionRepository, ProfileRepository, SessionRecord, SessionRepository, UserProfile};
use noesis_types::{EngineError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(user_id).cloned())
    }

    async fn upsert(&self, profile: UserProfile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryInteractionRepository {
    entries: Arc<RwLock<Vec<InteractionHistory>>>,
}

#[async_trait]
impl InteractionRepository for InMemoryInteractionRepository {
    async fn append(&self, entry: InteractionHistory) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn recent(&self, user_id: &str, session_id: Option<&str>, limit: usize) -> Result<Vec<InteractionHistory>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<InteractionHistory> = entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| session_id.is_none_or(|sid| e.session_id == sid))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn record_feedback(&self, user_id: &str, session_id: &str, rating: Option<i32>, comment: Option<&str>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .filter(|e| e.user_id == user_id && e.session_id == session_id)
            .next_back()
            .ok_or_else(|| EngineError::NotFound(format!("no interaction for user {user_id} session {session_id}")))?;
        entry.user_rating = rating;
        entry.user_comment = comment.map(|s| s.to_string());
        Ok(())
    }
}

/// Bounded, newest-first index, matching the session/thread index contract
/// in §3 (`user -> threads`, `thread -> sessions`).
const MAX_INDEX_ENTRIES: usize = 200;

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    user_threads: Arc<RwLock<HashMap<String, Vec<String>>>>,
    thread_sessions: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, record: SessionRecord) -> Result<()> {
        {
            let mut user_threads = self.user_threads.write().await;
            let threads = user_threads.entry(record.user_id.clone()).or_default();
            threads.retain(|t| t != &record.thread_id);
            threads.insert(0, record.thread_id.clone());
            threads.truncate(MAX_INDEX_ENTRIES);
        }
        {
            let mut thread_sessions = self.thread_sessions.write().await;
            let sessions = thread_sessions.entry(record.thread_id.clone()).or_default();
            sessions.insert(0, record.session_id.clone());
            sessions.truncate(MAX_INDEX_ENTRIES);
        }
        let mut sessions = self.sessions.write().await;
        sessions.insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn threads_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<String>> {
        let user_threads = self.user_threads.read().await;
        Ok(user_threads.get(user_id).map(|t| t.iter().take(limit).cloned().collect()).unwrap_or_default())
    }

    async fn sessions_for_thread(&self, thread_id: &str, limit: usize) -> Result<Vec<String>> {
        let thread_sessions = self.thread_sessions.read().await;
        Ok(thread_sessions.get(thread_id).map(|s| s.iter().take(limit).cloned().collect()).unwrap_or_default())
    }
}
