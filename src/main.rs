use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use newscred_pipeline::core::config::load_pipeline_config;
use newscred_pipeline::core::types::{RequestDescriptor, ScoredArticle};
use newscred_pipeline::registry::SourceRegistry;
use newscred_pipeline::{pipeline, PipelineConfig};

struct ServerState {
    registry: SourceRegistry,
    config: PipelineConfig,
}

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["NEWSCRED_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("starting newscred pipeline server");

    let config = load_pipeline_config();

    let manifest_path = std::env::var("NEWSCRED_MANIFEST")
        .unwrap_or_else(|_| "manifests/sources.example.toml".to_string());
    let registry = if tokio::fs::metadata(&manifest_path).await.is_ok() {
        info!("loading source manifest from {}", manifest_path);
        SourceRegistry::load_from_path(
            std::path::Path::new(&manifest_path),
            config.source_management.max_consecutive_failures,
        )
    } else {
        warn!(
            "no source manifest found at {}; starting with an empty registry",
            manifest_path
        );
        SourceRegistry::empty(config.source_management.max_consecutive_failures)
    };

    let stats = registry.get_stats().await;
    info!(tiers = ?stats.tier_counts, kinds = ?stats.kind_counts, "registry ready");

    let state = Arc::new(ServerState { registry, config });

    let app = Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/rank", post(rank_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let port: u16 = parse_port_from_args().or_else(port_from_env).unwrap_or(5000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "address already in use: {}. Stop the existing process or run with --port {} (or set PORT/NEWSCRED_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "newscred-pipeline",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn rank_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RequestDescriptor>,
) -> Result<Json<Vec<ScoredArticle>>, (StatusCode, Json<serde_json::Value>)> {
    match pipeline::run(&request, &state.registry, &state.config).await {
        Ok(ranked) => Ok(Json(ranked)),
        Err(e) => {
            error!("pipeline run failed: {}", e);
            let status = match e {
                newscred_pipeline::PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                newscred_pipeline::PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((status, Json(serde_json::json!({ "error": e.to_string() }))))
        }
    }
}
