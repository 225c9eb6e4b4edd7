use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;

use clientflow::api::api_routes;
use clientflow::config::EngineConfig;
use clientflow::engine::OnboardingEngine;
use clientflow::executor::ExecutorRegistry;
use clientflow::executor::simulated::register_simulated;
use clientflow::store::{LibSqlStore, OnboardingStore};
use clientflow::workflow::WorkflowDefinition;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let port: u16 = std::env::var("CLIENTFLOW_PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .unwrap_or(8000);

    let db_path = std::env::var("CLIENTFLOW_DB_PATH")
        .unwrap_or_else(|_| "./data/clientflow.db".to_string());

    let step_delay_ms: u64 = std::env::var("CLIENTFLOW_SIM_DELAY_MS")
        .unwrap_or_else(|_| "2000".to_string())
        .parse()
        .unwrap_or(2000);

    eprintln!("🚀 ClientFlow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API:      http://0.0.0.0:{}/api/onboarding", port);
    eprintln!("   WS:       ws://0.0.0.0:{}/ws/{{client_id}}", port);
    eprintln!("   Database: {}", db_path);

    // ── Store ────────────────────────────────────────────────────────────
    let store: Arc<dyn OnboardingStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );

    // ── Engine ───────────────────────────────────────────────────────────
    let config = EngineConfig::from_env();
    eprintln!(
        "   Retries:  {} attempt(s) per step",
        config.retry.max_attempts
    );
    match config.approval_timeout {
        Some(t) => eprintln!("   Approval: auto-fails after {}s", t.as_secs()),
        None => eprintln!("   Approval: waits indefinitely"),
    }

    let mut executors = ExecutorRegistry::new();
    register_simulated(&mut executors, Duration::from_millis(step_delay_ms));
    eprintln!("   Executors: {} registered (simulated)\n", executors.count());

    let engine = OnboardingEngine::new(
        config,
        WorkflowDefinition::standard(),
        executors,
        store,
    );

    // ── Server ───────────────────────────────────────────────────────────
    let app = api_routes(engine).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, "ClientFlow API started");
    axum::serve(listener, app).await?;

    Ok(())
}
