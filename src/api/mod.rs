//! HTTP prediction service.
//!
//! The router is built from an [`AppState`] holding the loaded predictor, so
//! tests drive it with `tower::ServiceExt::oneshot` without opening a socket.

pub mod error;
pub mod handlers;
pub mod types;

use crate::config::ServeConfig;
use crate::core::predictor::Predictor;
use crate::utils::error::Result;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
        }
    }
}

/// 建立路由；有 `static_dir` 時 `/` 與未知路徑交給前端靜態檔案
pub fn create_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/model", get(handlers::model_handler))
        .route("/predict", post(handlers::predict_handler));

    let app = match static_dir {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            api.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => api
            .route("/", get(handlers::index_handler))
            .fallback(handlers::not_found_handler),
    };

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &ServeConfig, state: AppState) -> Result<()> {
    let static_dir = config.static_dir.as_ref().map(PathBuf::from);
    if let Some(dir) = &static_dir {
        if !dir.join("index.html").is_file() {
            tracing::warn!("Static directory {} has no index.html", dir.display());
        }
        tracing::info!("Serving web client from {}", dir.display());
    }

    let app = create_router(state, static_dir);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
