//! Capability port traits: narrow interfaces with at least a mock and one
//! real adapter (§6). The orchestrator and sub-graphs depend only on these
//! traits, never on a concrete provider.

use async_trait::async_trait;
use noesis_types::Result;
use serde::{Deserialize, Serialize};

/// One search result (§6 Search port).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source: String,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait SearchPort: Send + Sync {
    async fn search(&self, query: &str, num_results: usize, search_type: &str) -> Result<Vec<SearchResult>>;
}

/// Render search results as a numbered markdown-ish context block, or the
/// documented empty-result placeholder.
pub fn format_results_as_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "（未检索到相关信息）".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. **{}**\n   {}\n   来源：{}", i + 1, r.title, r.snippet, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait KnowledgePort: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageAnalysisResult {
    pub description: String,
    pub tags: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoAnalysisResult {
    pub summary: String,
    pub scenes: Vec<String>,
    pub confidence: f64,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait MultimodalPort: Send + Sync {
    async fn analyze_image(&self, url_or_bytes: &str) -> Result<ImageAnalysisResult>;
    async fn analyze_video(&self, url: &str) -> Result<VideoAnalysisResult>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViralPrediction {
    pub score: f64,
    pub confidence: f64,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtrPrediction {
    pub ctr: f64,
    pub confidence: f64,
    pub factors: Vec<String>,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait PredictionPort: Send + Sync {
    async fn predict_viral(&self, features: &serde_json::Value, platform: &str) -> Result<ViralPrediction>;
    async fn predict_ctr(&self, cover_features: &serde_json::Value, title: &str, platform: &str) -> Result<CtrPrediction>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoContentStructure {
    pub hook: String,
    pub body_beats: Vec<String>,
    pub call_to_action: String,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait VideoDecompositionPort: Send + Sync {
    async fn decompose(
        &self,
        video_url: Option<&str>,
        raw_text: Option<&str>,
        platform: Option<&str>,
    ) -> Result<VideoContentStructure>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleRecord {
    pub video_id: String,
    pub platform: String,
    pub category: String,
    pub payload: serde_json::Value,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait SampleLibraryPort: Send + Sync {
    async fn ingest(&self, samples: Vec<SampleRecord>, batch_size: usize) -> Result<usize>;
    async fn search(&self, platform: Option<&str>, category: Option<&str>, top_k: usize) -> Result<Vec<SampleRecord>>;
    async fn get_by_id(&self, video_id: &str, platform: Option<&str>) -> Result<Option<SampleRecord>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub sensitive_words: Vec<String>,
    pub prohibited_visuals: Vec<String>,
    pub thresholds: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait PlatformRulesPort: Send + Sync {
    async fn get_rules(&self, platform: &str) -> Result<RuleSet>;
    async fn reload(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait MethodologyService: Send + Sync {
    async fn list_docs(&self, category: Option<&str>) -> Result<Vec<String>>;
    async fn get_doc(&self, path: &str) -> Result<Option<String>>;
    async fn create_doc(&self, path: &str, content: &str) -> Result<()>;
    async fn update_doc(&self, path: &str, content: &str) -> Result<()>;
    async fn delete_doc(&self, path: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseTemplate {
    pub id: String,
    pub title: String,
    pub body: String,
    pub scores: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait CaseTemplateService: Send + Sync {
    async fn create(&self, template: CaseTemplate) -> Result<String>;
    async fn get_by_id(&self, id: &str) -> Result<Option<CaseTemplate>>;
    async fn list(&self) -> Result<Vec<CaseTemplate>>;
    async fn update(&self, template: CaseTemplate) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait DataLoopService: Send + Sync {
    async fn record_feedback(&self, user_id: &str, session_id: &str, rating: Option<i32>, comment: Option<&str>) -> Result<()>;
    async fn get_feedbacks(&self, user_id: Option<&str>, session_id: Option<&str>, limit: usize) -> Result<Vec<serde_json::Value>>;
    async fn record_platform_metric(&self, video_id: &str, metric: serde_json::Value) -> Result<()>;
    async fn get_platform_metrics(&self, video_id: &str) -> Result<Vec<serde_json::Value>>;
    async fn get_video_performance(&self, video_id: &str) -> Result<Option<serde_json::Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_results_render_placeholder() {
        assert_eq!(format_results_as_context(&[]), "（未检索到相关信息）");
    }

    #[test]
    fn results_render_numbered_block() {
        let results = vec![SearchResult {
            title: "t".into(),
            snippet: "s".into(),
            url: "u".into(),
            source: "src".into(),
        }];
        let rendered = format_results_as_context(&results);
        assert!(rendered.starts_with("1. **t**"));
        assert!(rendered.contains("来源：u"));
    }
}
