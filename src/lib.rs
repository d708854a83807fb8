pub mod builder;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod extraction;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod session;
pub mod streaming;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use collaborators::{AnthropicLlmClient, HttpVectorSearchClient, PostgresSqlExecutor};
use config::AppConfig;
use search::{VectorTableSearch, VectorTemplateSearch};
use streaming::StreamingClients;

/// Wires every collaborator and cache from `config` into the shared
/// [`StreamingClients`] state, then builds the axum router. Constructed
/// once at startup; nothing here is rebuilt per request.
pub fn create_app(config: AppConfig) -> Router {
    let sql_executor = Arc::new(PostgresSqlExecutor::new(config.database_pool.clone()));
    let vector_search = Arc::new(HttpVectorSearchClient::new());
    let llm: Arc<dyn collaborators::LlmChatClient> = Arc::new(AnthropicLlmClient::new(config.llm.clone()));

    let template_search = Arc::new(VectorTemplateSearch::new(
        vector_search.clone(),
        config.vector_search.template_index_url.clone(),
        config.thresholds.template_confidence,
        config.thresholds.template_ambiguity_gap,
    ));
    let table_search = Arc::new(VectorTableSearch::new(
        vector_search,
        config.vector_search.table_index_url.clone(),
        config.thresholds.table_search_threshold,
    ));

    let allowed_values = cache::AllowedValuesProvider::new(
        sql_executor.clone(),
        config.cache.allowed_values_ttl,
        config.cache.allowed_values_max_entries,
    );

    let pipeline_clients = pipeline::PipelineClients {
        template_search,
        table_search,
        allowed_values,
        llm: llm.clone(),
        sql_executor,
        allowed_tables: config.allowed_tables.clone(),
        thresholds: config.thresholds,
    };

    let streaming_clients = StreamingClients {
        session_cache: Arc::new(cache::SessionCache::new(config.cache.session_max_entries, config.cache.session_ttl)),
        paused_workflow_cache: Arc::new(cache::PausedWorkflowCache::new(
            config.cache.paused_workflow_max_entries,
            config.cache.paused_workflow_ttl,
        )),
        pipeline: pipeline_clients,
        llm,
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config.cors_origins.iter().filter_map(|origin| origin.parse().ok()),
        ))
        .allow_methods([axum::http::Method::GET, axum::http::Method::PATCH, axum::http::Method::DELETE]);

    Router::new()
        .route("/api/chat/stream", get(handlers::chat_stream))
        .nest(
            "/api/threads",
            Router::new()
                .route("/:id", get(handlers::threads::get_thread))
                .route("/:id", axum::routing::patch(handlers::threads::patch_thread))
                .route("/:id", axum::routing::delete(handlers::threads::delete_thread))
                .route("/:id/messages", get(handlers::threads::list_thread_messages)),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(streaming_clients)
}

pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "nl2sql_gateway=info,tower_http=info,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
