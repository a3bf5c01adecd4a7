//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        BlobStoreAdapter, JwtTokenVerifier, OpenAiAnalysisAdapter, PdfTextExtractor,
        PgDocumentStore, PromptTemplates,
    },
    config::Config,
    error::ApiError,
    web::{
        self,
        state::{AppState, Collaborators},
    },
};
use async_openai::{config::OpenAIConfig, Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let document_store = Arc::new(PgDocumentStore::new(db_pool));
    info!("Running database migrations...");
    document_store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let blob_store = Arc::new(BlobStoreAdapter::from_config(
        &config.storage,
        &config.public_base_url,
    )?);

    let llm_config = OpenAIConfig::new()
        .with_api_key(
            config
                .llm_api_key
                .as_ref()
                .ok_or_else(|| ApiError::Internal("LLM_API_KEY is required".to_string()))?,
        )
        .with_api_base(&config.llm_api_base);
    let prompts = PromptTemplates::load(&config.prompts_path)?;
    let analyzer = Arc::new(OpenAiAnalysisAdapter::new(
        Client::with_config(llm_config),
        config.llm_model.clone(),
        prompts,
        config.max_prompt_chars,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        Collaborators {
            objects: blob_store,
            extractor: Arc::new(PdfTextExtractor::new()),
            analyzer,
            documents: document_store.clone(),
            quotas: document_store,
            token_verifier: Arc::new(JwtTokenVerifier::new(&config.jwt_secret)),
        },
    ));

    // --- 5. Start the Server ---
    let app = web::router(app_state);
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
