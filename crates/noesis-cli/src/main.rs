//! Command-line entry point: drives the engine end-to-end from a
//! terminal (`think`) or starts the HTTP facade (`serve`). Grounded on
//! `brain-cli/src/main.rs`'s subcommand shape, rewritten with `clap`'s
//! derive API (the workspace already carries the `derive` feature) in
//! place of the teacher's builder API.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use noesis_core::{Capabilities, ProcessedInput};
use noesis_engine::llm::{HttpLlmClient, LlmRouter, ModelRoleConfig};
use noesis_engine::{
    AnalysisSubGraph, FollowUpAdvisor, GenerationSubGraph, IntentProcessor, MemoryPort, MemoryService, NarrativeSynthesizer,
    Orchestrator, PluginCenter, PluginRegistry, StrategyPlanner,
};
use noesis_infra::cache::{DynCacheBackend, InMemoryCacheBackend, SmartCache};
use noesis_infra::config::EngineConfig;
use noesis_infra::memory_repo::{InMemoryInteractionRepository, InMemoryProfileRepository};
use noesis_infra::{InMemoryKnowledgePort, MidpointPredictionPort, NullSearchPort, PlaceholderMultimodalPort, PlaceholderVideoDecompositionPort, StaticPlatformRulesPort};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "noesis", version, about = "Deep-thinking marketing engine")]
struct Cli {
    /// Optional TOML config file, layered over built-in defaults.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one utterance through the engine and print the compiled report.
    Think {
        /// The raw utterance to process.
        query: String,
        #[arg(long, default_value = "cli-session")]
        session_id: String,
        #[arg(long, default_value = "cli-user")]
        user_id: String,
    },
    /// Start the HTTP facade.
    Serve,
}

fn role_map(settings: &HashMap<String, noesis_infra::config::ModelRoleSettings>) -> HashMap<String, ModelRoleConfig> {
    settings
        .iter()
        .map(|(name, s)| {
            (
                name.clone(),
                ModelRoleConfig {
                    provider: s.provider.clone(),
                    model: s.model.clone(),
                    temperature: s.temperature,
                    max_tokens: s.max_tokens,
                    base_url: s.base_url.clone(),
                    api_key_env: s.api_key_env.clone(),
                },
            )
        })
        .collect()
}

struct Engine {
    intent: Arc<IntentProcessor<HttpLlmClient>>,
    orchestrator: Arc<Orchestrator<HttpLlmClient>>,
    follow_up: Arc<FollowUpAdvisor<HttpLlmClient>>,
    documents: Arc<noesis_api::SessionDocumentStore>,
    config: EngineConfig,
}

fn build_engine(config: EngineConfig) -> Engine {
    let client = HttpLlmClient::default();
    let roles = role_map(&config.llm.roles);

    let router = Arc::new(LlmRouter::new(client.clone(), roles.clone()));
    let intent = Arc::new(IntentProcessor::new(LlmRouter::new(client, roles)));
    let planner = Arc::new(StrategyPlanner::new(router.clone()));

    let cache = SmartCache::new(InMemoryCacheBackend::default());
    let memory: Arc<dyn MemoryPort> = Arc::new(MemoryService::new(
        InMemoryProfileRepository::default(),
        InMemoryInteractionRepository::default(),
        Some(cache),
        config.cache.ttl_memory_seconds,
    ));

    let capabilities = Arc::new(Capabilities {
        search: Arc::new(NullSearchPort),
        knowledge: Arc::new(InMemoryKnowledgePort::default()),
        multimodal: Arc::new(PlaceholderMultimodalPort),
        prediction: Arc::new(MidpointPredictionPort),
        video_decomposition: Arc::new(PlaceholderVideoDecompositionPort),
        sample_library: Arc::new(noesis_infra::InMemorySampleLibraryPort::default()),
        platform_rules: Arc::new(StaticPlatformRulesPort::new(HashMap::new())),
        methodology: None,
        case_template: None,
        data_loop: None,
    });

    let step_timeout = Duration::from_secs(config.orchestrator.default_step_timeout_seconds);
    let hotspot_center = Arc::new(PluginCenter::new("hotspot"));
    let analysis_cache = Arc::new(SmartCache::new(DynCacheBackend::new(Arc::new(InMemoryCacheBackend::default()))));
    let analysis_graph = Arc::new(AnalysisSubGraph::new(
        router.clone(),
        Arc::new(PluginCenter::new("analysis")),
        step_timeout,
        Some(analysis_cache),
        config.cache.ttl_analysis_with_plugins_seconds,
    ));
    let generation_graph = Arc::new(GenerationSubGraph::new(router.clone(), Arc::new(PluginCenter::new("generation")), step_timeout));
    let narrative = Arc::new(NarrativeSynthesizer::new(router.clone()));
    let registry = Arc::new(PluginRegistry::new());

    let orchestrator = Arc::new(Orchestrator::new(
        planner,
        router.clone(),
        memory,
        capabilities,
        hotspot_center,
        analysis_graph,
        generation_graph,
        narrative,
        registry,
        config.orchestrator.max_concurrent_capability_calls,
        step_timeout,
    ));
    let follow_up = Arc::new(FollowUpAdvisor::new(router));

    Engine {
        intent,
        orchestrator,
        follow_up,
        documents: Arc::new(noesis_api::SessionDocumentStore::new()),
        config,
    }
}

async fn run_think(engine: &Engine, query: String, session_id: String, user_id: String) -> Result<()> {
    let processed: ProcessedInput = engine.intent.process(&query, session_id.clone(), user_id, None).await;
    let document_context = engine
        .documents
        .get_session_document_context(&session_id, 8000, 20000);
    let doc_ref = if document_context.trim().is_empty() { None } else { Some(document_context.as_str()) };

    let final_state = engine.orchestrator.run(&processed, None, doc_ref).await;
    println!("{}", final_state.content);

    let intent_label = format!("{:?}", processed.intent);
    let suggestion = engine.follow_up.suggest(&intent_label, &final_state.plan.steps, &final_state.content).await;
    if !suggestion.step.is_empty() {
        println!("\n---\n{}", suggestion.text);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Think { query, session_id, user_id } => {
            let engine = build_engine(config);
            run_think(&engine, query, session_id, user_id).await?;
        }
        Commands::Serve => {
            let engine = build_engine(config);
            let state = noesis_api::AppState {
                intent: engine.intent,
                orchestrator: engine.orchestrator,
                follow_up: engine.follow_up,
                documents: engine.documents,
                max_chars_per_doc: 8000,
                max_total_chars: 20000,
            };
            let app = noesis_api::create_router(state);
            let addr = format!("{}:{}", engine.config.server.host, engine.config.server.port);
            tracing::info!(%addr, "starting noesis HTTP facade");
            let listener = tokio::net::TcpListener::bind(&addr).await.context("binding server address")?;
            axum::serve(listener, app).await.context("serving HTTP requests")?;
        }
    }

    Ok(())
}
