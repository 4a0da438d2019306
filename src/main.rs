use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use meal_coach::api::{self, AppState};
use meal_coach::auth::{FirebaseVerifier, IdentityVerifier};
use meal_coach::coach::CoachEngine;
use meal_coach::config::AppConfig;
use meal_coach::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    eprintln!("🥗 Meal Coach v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://{}/api", config.server.bind_addr());

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(Path::new(&config.database_path))
            .await
            .with_context(|| format!("failed to open database at {}", config.database_path))?,
    );
    eprintln!("   Database: {}", config.database_path);

    // ── Identity ─────────────────────────────────────────────────────────
    let firebase = FirebaseVerifier::new(config.firebase.clone());
    if firebase.is_configured() {
        eprintln!(
            "   Firebase project: {}",
            config.firebase.project_id.as_deref().unwrap_or_default()
        );
    } else {
        tracing::warn!("Firebase project not configured, authenticated routes will reject");
    }
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(firebase);

    // ── Coach ────────────────────────────────────────────────────────────
    let coach = CoachEngine::from_config(&config.coach);
    match (&config.coach.vertex, coach.has_fallback()) {
        (Some(vertex), true) => eprintln!(
            "   Coach: rules + Vertex AI ({}, {})",
            vertex.model, vertex.location
        ),
        _ => eprintln!("   Coach: rules only"),
    }

    let app = api::router(AppState::new(db, verifier, coach));

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Meal coach API listening");
    eprintln!();

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
