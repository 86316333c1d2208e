//! Thin HTTP facade (§6) for driving the engine: `POST /v1/think`,
//! `GET /healthz`, `GET /v1/sessions/:id/document-context`. Grounded on
//! `brain-api/src/visualization.rs`'s `axum::Router` construction (the
//! teacher's other HTTP surfaces use `warp`; this one follows the
//! `axum`-based route it already has, generalized from static pages to
//! JSON endpoints). No business logic lives here — it deserializes
//! requests, calls the engine, serializes responses.

pub mod documents;

pub use documents::SessionDocumentStore;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use noesis_engine::{FollowUpAdvisor, IntentProcessor, LlmClient, Orchestrator};
use noesis_types::EngineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a request handler needs, generic over the LLM transport so
/// tests can swap in a stub client.
pub struct AppState<C: LlmClient> {
    pub intent: Arc<IntentProcessor<C>>,
    pub orchestrator: Arc<Orchestrator<C>>,
    pub follow_up: Arc<FollowUpAdvisor<C>>,
    pub documents: Arc<SessionDocumentStore>,
    pub max_chars_per_doc: usize,
    pub max_total_chars: usize,
}

impl<C: LlmClient> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            intent: self.intent.clone(),
            orchestrator: self.orchestrator.clone(),
            follow_up: self.follow_up.clone(),
            documents: self.documents.clone(),
            max_chars_per_doc: self.max_chars_per_doc,
            max_total_chars: self.max_total_chars,
        }
    }
}

pub fn create_router<C: LlmClient + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/think", post(think::<C>))
        .route("/v1/sessions/:id/document-context", get(document_context::<C>))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
pub struct ThinkRequest {
    pub raw_query: String,
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub conversation_context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FollowUpDto {
    pub text: String,
    pub step: String,
}

#[derive(Debug, Serialize)]
pub struct ThinkResponse {
    pub report: String,
    pub need_revision: bool,
    pub follow_up: Option<FollowUpDto>,
}

async fn think<C: LlmClient>(State(state): State<AppState<C>>, Json(request): Json<ThinkRequest>) -> Result<Json<ThinkResponse>, ApiError> {
    if request.raw_query.trim().is_empty() {
        return Err(ApiError(EngineError::InvalidInput("raw_query must not be empty".to_string())));
    }

    let document_context = state.documents.get_session_document_context(&request.session_id, state.max_chars_per_doc, state.max_total_chars);
    let doc_context_ref = if document_context.trim().is_empty() { None } else { Some(document_context.as_str()) };

    let processed = state
        .intent
        .process(&request.raw_query, request.session_id.clone(), request.user_id.clone(), request.conversation_context.as_deref())
        .await;

    let final_state = state.orchestrator.run(&processed, request.conversation_context.as_deref(), doc_context_ref).await;

    let intent_label = format!("{:?}", processed.intent);
    let suggestion = state.follow_up.suggest(&intent_label, &final_state.plan.steps, &final_state.content).await;

    Ok(Json(ThinkResponse {
        report: final_state.content,
        need_revision: final_state.need_revision,
        follow_up: if suggestion.step.is_empty() {
            None
        } else {
            Some(FollowUpDto { text: suggestion.text, step: suggestion.step })
        },
    }))
}

#[derive(Debug, Serialize)]
struct DocumentContextResponse {
    context: String,
}

async fn document_context<C: LlmClient>(State(state): State<AppState<C>>, Path(session_id): Path<String>) -> Json<DocumentContextResponse> {
    let context = state.documents.get_session_document_context(&session_id, state.max_chars_per_doc, state.max_total_chars);
    Json(DocumentContextResponse { context })
}

/// Maps an `EngineError` to an HTTP status + JSON error body.
struct ApiError(EngineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidInput(_) | EngineError::ParseError(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({"error": self.0.to_string()}));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use noesis_core::{MetaState, PlanStep, ProcessedInput};
    use noesis_engine::llm::{ChatMessage, LlmRouter, ModelRoleConfig};
    use noesis_engine::{AnalysisSubGraph, GenerationSubGraph, NarrativeSynthesizer, PluginCenter, PluginRegistry, StrategyPlanner};
    use noesis_infra::cache::InMemoryCacheBackend;
    use noesis_infra::memory_repo::{InMemoryInteractionRepository, InMemoryProfileRepository};
    use noesis_types::Result;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    struct EchoLlmClient;

    #[async_trait]
    impl LlmClient for EchoLlmClient {
        async fn complete(&self, _role: &ModelRoleConfig, _messages: &[ChatMessage]) -> Result<String> {
            Ok("[]".to_string())
        }
    }

    fn roles() -> HashMap<String, ModelRoleConfig> {
        let cfg = ModelRoleConfig {
            provider: "test".to_string(),
            model: "test".to_string(),
            temperature: 0.2,
            max_tokens: 256,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        let mut roles = HashMap::new();
        for role in [
            noesis_engine::llm::ROLE_INTENT,
            noesis_engine::llm::ROLE_STRATEGY,
            noesis_engine::llm::ROLE_ANALYSIS,
            noesis_engine::llm::ROLE_EVALUATION,
        ] {
            roles.insert(role.to_string(), cfg.clone());
        }
        roles
    }

    fn state() -> AppState<EchoLlmClient> {
        let router = Arc::new(LlmRouter::new(EchoLlmClient, roles()));
        let intent = Arc::new(IntentProcessor::new(LlmRouter::new(EchoLlmClient, roles())));
        let planner = Arc::new(StrategyPlanner::new(router.clone()));
        let memory = Arc::new(noesis_engine::MemoryService::new(
            InMemoryProfileRepository::default(),
            InMemoryInteractionRepository::default(),
            Some(noesis_infra::cache::SmartCache::new(InMemoryCacheBackend::default())),
            0,
        )) as Arc<dyn noesis_engine::MemoryPort>;
        let capabilities = Arc::new(noesis_core::Capabilities {
            search: Arc::new(noesis_infra::NullSearchPort),
            knowledge: Arc::new(noesis_infra::InMemoryKnowledgePort::default()),
            multimodal: Arc::new(noesis_infra::PlaceholderMultimodalPort),
            prediction: Arc::new(noesis_infra::MidpointPredictionPort),
            video_decomposition: Arc::new(noesis_infra::PlaceholderVideoDecompositionPort),
            sample_library: Arc::new(noesis_infra::InMemorySampleLibraryPort::default()),
            platform_rules: Arc::new(noesis_infra::StaticPlatformRulesPort::new(HashMap::new())),
            methodology: None,
            case_template: None,
            data_loop: None,
        });
        let orchestrator = Arc::new(Orchestrator::new(
            planner,
            router.clone(),
            memory,
            capabilities,
            Arc::new(PluginCenter::new("hotspot")),
            Arc::new(AnalysisSubGraph::new(router.clone(), Arc::new(PluginCenter::new("analysis")), Duration::from_secs(5), None, 0)),
            Arc::new(GenerationSubGraph::new(router.clone(), Arc::new(PluginCenter::new("generation")), Duration::from_secs(5))),
            Arc::new(NarrativeSynthesizer::new(router.clone())),
            Arc::new(PluginRegistry::new()),
            4,
            Duration::from_secs(5),
        ));
        let follow_up = Arc::new(FollowUpAdvisor::new(router));

        AppState {
            intent,
            orchestrator,
            follow_up,
            documents: Arc::new(SessionDocumentStore::new()),
            max_chars_per_doc: 8000,
            max_total_chars: 20000,
        }
    }

    #[tokio::test]
    async fn healthz_returns_ok_status() {
        let app = create_router(state());
        let response = app
            .oneshot(axum::http::Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn think_rejects_empty_query() {
        let app = create_router(state());
        let body = serde_json::json!({"raw_query": "  ", "session_id": "s1", "user_id": "u1"});
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/v1/think")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn document_context_endpoint_returns_empty_for_unknown_session() {
        let app = create_router(state());
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/v1/sessions/unknown/document-context")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[allow(dead_code)]
    fn unused_imports_guard(_s: &MetaState, _p: &PlanStep, _i: &ProcessedInput) {}
}
