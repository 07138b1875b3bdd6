mod compile;
mod config;
mod errors;
mod letter;
mod llm_client;
mod routes;
mod state;
mod usage;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::compile::LatexCompiler;
use crate::config::Config;
use crate::letter::pipeline::DocumentPipeline;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::usage::{LogUsageLedger, RedisUsageLedger, UsageLedger};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cover Letter API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Usage ledger: Redis when configured, log-only otherwise
    let ledger: Arc<dyn UsageLedger> = match &config.redis_url {
        Some(url) => {
            let redis = redis::Client::open(url.as_str())?;
            info!("Redis client initialized");
            Arc::new(RedisUsageLedger::new(redis))
        }
        None => {
            info!("REDIS_URL not set; usage will only be logged");
            Arc::new(LogUsageLedger)
        }
    };

    let compiler = LatexCompiler::new(config.compiler_config());
    info!(
        "Compiler: {} (scratch {}, timeout {}s)",
        compiler.config().program.display(),
        compiler.config().scratch_dir.display(),
        compiler.config().timeout.as_secs()
    );
    let pipeline = DocumentPipeline::new(Arc::new(llm), compiler);

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        ledger,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
