//! Capability port adapters (§6). `HttpSearchPort` is a real `reqwest`
//! client in the style of `HttpClient`; the remaining ports ship
//! deterministic in-memory stand-ins so the engine is runnable end to end
//! without any external service configured. A deployment wires real
//! adapters behind the same traits.

use async_trait::async_trait;
use noesis_core::{
    CaseTemplate, CaseTemplateService, CtrPrediction, DataLoopService, ImageAnalysisResult,
    KnowledgePort, MethodologyService, MultimodalPort, PlatformRulesPort, PredictionPort,
    RuleSet, SampleLibraryPort, SampleRecord, SearchPort, SearchResult, VideoAnalysisResult,
    VideoContentStructure, VideoDecompositionPort, ViralPrediction,
};
use noesis_types::{EngineError, Result};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// `SearchPort` backed by a real HTTP GET against a configured search
/// endpoint. Grounded on `HttpClient`'s builder-style construction.
pub struct HttpSearchPort {
    client: Client,
    endpoint: String,
}

impl HttpSearchPort {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SearchPort for HttpSearchPort {
    async fn search(&self, query: &str, num_results: usize, search_type: &str) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("num", &num_results.to_string()),
                ("type", search_type),
            ])
            .send()
            .await
            .map_err(|e| EngineError::NetworkError(format!("search request failed: {e}")))?;

        let results: Vec<SearchResult> = response
            .json()
            .await
            .map_err(|e| EngineError::ParseError(format!("search response malformed: {e}")))?;
        Ok(results)
    }
}

/// Fallback `SearchPort` for deployments with no configured search
/// endpoint: always returns no results, letting the caller's
/// `format_results_as_context` fall back to its placeholder text.
#[derive(Default)]
pub struct NullSearchPort;

#[async_trait]
impl SearchPort for NullSearchPort {
    async fn search(&self, _query: &str, _num_results: usize, _search_type: &str) -> Result<Vec<SearchResult>> {
        Ok(Vec::new())
    }
}

/// In-memory `KnowledgePort` backed by a fixed document set, keyed by a
/// naive substring match. A real deployment swaps this for a vector store.
#[derive(Default)]
pub struct InMemoryKnowledgePort {
    documents: Vec<String>,
}

impl InMemoryKnowledgePort {
    pub fn new(documents: Vec<String>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl KnowledgePort for InMemoryKnowledgePort {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let query_lower = query.to_lowercase();
        Ok(self
            .documents
            .iter()
            .filter(|doc| doc.to_lowercase().contains(&query_lower))
            .take(top_k)
            .cloned()
            .collect())
    }
}

/// `MultimodalPort` stand-in: reports a fixed low-confidence placeholder
/// result rather than calling a vision model, so callers can exercise the
/// full pipeline without one configured.
#[derive(Default)]
pub struct PlaceholderMultimodalPort;

#[async_trait]
impl MultimodalPort for PlaceholderMultimodalPort {
    async fn analyze_image(&self, _url_or_bytes: &str) -> Result<ImageAnalysisResult> {
        Ok(ImageAnalysisResult {
            description: "no multimodal adapter configured".to_string(),
            tags: Vec::new(),
            confidence: 0.0,
        })
    }

    async fn analyze_video(&self, _url: &str) -> Result<VideoAnalysisResult> {
        Ok(VideoAnalysisResult {
            summary: "no multimodal adapter configured".to_string(),
            scenes: Vec::new(),
            confidence: 0.0,
        })
    }
}

/// `PredictionPort` stand-in: a deterministic midpoint prediction, useful
/// for tests and for deployments with no trained model wired in yet.
#[derive(Default)]
pub struct MidpointPredictionPort;

#[async_trait]
impl PredictionPort for MidpointPredictionPort {
    async fn predict_viral(&self, _features: &Value, _platform: &str) -> Result<ViralPrediction> {
        Ok(ViralPrediction {
            score: 0.5,
            confidence: 0.0,
            factors: vec!["no prediction model configured".to_string()],
        })
    }

    async fn predict_ctr(&self, _cover_features: &Value, _title: &str, _platform: &str) -> Result<CtrPrediction> {
        Ok(CtrPrediction {
            ctr: 0.5,
            confidence: 0.0,
            factors: vec!["no prediction model configured".to_string()],
        })
    }
}

#[derive(Default)]
pub struct PlaceholderVideoDecompositionPort;

#[async_trait]
impl VideoDecompositionPort for PlaceholderVideoDecompositionPort {
    async fn decompose(
        &self,
        _video_url: Option<&str>,
        _raw_text: Option<&str>,
        _platform: Option<&str>,
    ) -> Result<VideoContentStructure> {
        Ok(VideoContentStructure::default())
    }
}

/// `SampleLibraryPort` over an in-process map keyed by `(video_id,
/// platform)`, matching the composite lookup the trait exposes.
#[derive(Default)]
pub struct InMemorySampleLibraryPort {
    records: Arc<RwLock<HashMap<(String, String), SampleRecord>>>,
}

#[async_trait]
impl SampleLibraryPort for InMemorySampleLibraryPort {
    async fn ingest(&self, samples: Vec<SampleRecord>, _batch_size: usize) -> Result<usize> {
        let mut records = self.records.write().await;
        let count = samples.len();
        for sample in samples {
            records.insert((sample.video_id.clone(), sample.platform.clone()), sample);
        }
        Ok(count)
    }

    async fn search(&self, platform: Option<&str>, category: Option<&str>, top_k: usize) -> Result<Vec<SampleRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| platform.is_none_or(|p| r.platform == p))
            .filter(|r| category.is_none_or(|c| r.category == c))
            .take(top_k)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, video_id: &str, platform: Option<&str>) -> Result<Option<SampleRecord>> {
        let records = self.records.read().await;
        if let Some(platform) = platform {
            return Ok(records.get(&(video_id.to_string(), platform.to_string())).cloned());
        }
        Ok(records.values().find(|r| r.video_id == video_id).cloned())
    }
}

/// `PlatformRulesPort` over a static in-memory table, loaded once at
/// construction. `reload` keeps the default no-op: there is no external
/// source to re-read.
pub struct StaticPlatformRulesPort {
    rules: HashMap<String, RuleSet>,
}

impl StaticPlatformRulesPort {
    pub fn new(rules: HashMap<String, RuleSet>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl PlatformRulesPort for StaticPlatformRulesPort {
    async fn get_rules(&self, platform: &str) -> Result<RuleSet> {
        Ok(self.rules.get(platform).cloned().unwrap_or_default())
    }
}

/// In-memory `MethodologyService`, `CaseTemplateService`, and
/// `DataLoopService` adapters: these three capability ports are optional
/// in `Capabilities` (§4.14) and ship here only so a deployment can enable
/// them without writing its own store first.
#[derive(Default)]
pub struct InMemoryMethodologyService {
    docs: Arc<RwLock<HashMap<String, String>>>,
}

#[async_trait]
impl MethodologyService for InMemoryMethodologyService {
    async fn list_docs(&self, category: Option<&str>) -> Result<Vec<String>> {
        let docs = self.docs.read().await;
        Ok(docs
            .keys()
            .filter(|path| category.is_none_or(|c| path.starts_with(c)))
            .cloned()
            .collect())
    }

    async fn get_doc(&self, path: &str) -> Result<Option<String>> {
        let docs = self.docs.read().await;
        Ok(docs.get(path).cloned())
    }

    async fn create_doc(&self, path: &str, content: &str) -> Result<()> {
        let mut docs = self.docs.write().await;
        docs.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn update_doc(&self, path: &str, content: &str) -> Result<()> {
        let mut docs = self.docs.write().await;
        if !docs.contains_key(path) {
            return Err(EngineError::NotFound(format!("methodology doc not found: {path}")));
        }
        docs.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn delete_doc(&self, path: &str) -> Result<()> {
        let mut docs = self.docs.write().await;
        docs.remove(path);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCaseTemplateService {
    templates: Arc<RwLock<HashMap<String, CaseTemplate>>>,
}

#[async_trait]
impl CaseTemplateService for InMemoryCaseTemplateService {
    async fn create(&self, template: CaseTemplate) -> Result<String> {
        let id = template.id.clone();
        let mut templates = self.templates.write().await;
        templates.insert(id.clone(), template);
        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<CaseTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<CaseTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates.values().cloned().collect())
    }

    async fn update(&self, template: CaseTemplate) -> Result<()> {
        let mut templates = self.templates.write().await;
        if !templates.contains_key(&template.id) {
            return Err(EngineError::NotFound(format!("case template not found: {}", template.id)));
        }
        templates.insert(template.id.clone(), template);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut templates = self.templates.write().await;
        templates.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDataLoopService {
    feedbacks: Arc<RwLock<Vec<Value>>>,
    platform_metrics: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

#[async_trait]
impl DataLoopService for InMemoryDataLoopService {
    async fn record_feedback(&self, user_id: &str, session_id: &str, rating: Option<i32>, comment: Option<&str>) -> Result<()> {
        let mut feedbacks = self.feedbacks.write().await;
        feedbacks.push(serde_json::json!({
            "user_id": user_id,
            "session_id": session_id,
            "rating": rating,
            "comment": comment,
        }));
        Ok(())
    }

    async fn get_feedbacks(&self, user_id: Option<&str>, session_id: Option<&str>, limit: usize) -> Result<Vec<Value>> {
        let feedbacks = self.feedbacks.read().await;
        Ok(feedbacks
            .iter()
            .filter(|f| user_id.is_none_or(|u| f["user_id"] == u))
            .filter(|f| session_id.is_none_or(|s| f["session_id"] == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_platform_metric(&self, video_id: &str, metric: Value) -> Result<()> {
        let mut platform_metrics = self.platform_metrics.write().await;
        platform_metrics.entry(video_id.to_string()).or_default().push(metric);
        Ok(())
    }

    async fn get_platform_metrics(&self, video_id: &str) -> Result<Vec<Value>> {
        let platform_metrics = self.platform_metrics.read().await;
        Ok(platform_metrics.get(video_id).cloned().unwrap_or_default())
    }

    async fn get_video_performance(&self, video_id: &str) -> Result<Option<Value>> {
        let platform_metrics = self.platform_metrics.read().await;
        Ok(platform_metrics.get(video_id).and_then(|metrics| metrics.last().cloned()))
    }
}
