//! Axum-based HTTP server.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use prism_node::{PrismMetrics, PrismNode, ShutdownSignal};
use prism_splits::{Services, SharedSplit, SplitRegistry};

use crate::error::RpcError;
use crate::handlers;

/// Everything the handlers need from the running node.
pub struct RpcState {
    pub registry: Arc<SplitRegistry>,
    pub services: Arc<Services>,
    pub metrics: Arc<PrismMetrics>,
    /// Domain used when the request's `Host` names no split.
    pub public_domain: String,
    pub enable_metrics: bool,
}

impl RpcState {
    pub fn from_node(node: &PrismNode) -> Self {
        Self {
            registry: Arc::clone(&node.driver.registry),
            services: Arc::clone(&node.driver.services),
            metrics: Arc::clone(&node.driver.metrics),
            public_domain: node.config.public_domain.clone(),
            enable_metrics: node.config.enable_metrics,
        }
    }

    /// The split `name` at the request's host, else at the public domain.
    pub async fn find_split(&self, name: &str, host: Option<&str>) -> Result<SharedSplit, RpcError> {
        let name = name.trim().to_lowercase();
        let domains = host.into_iter().chain(std::iter::once(self.public_domain.as_str()));
        for domain in domains {
            if let Some(split) = self.registry.get_by_address(&format!("{name}@{domain}")).await {
                return Ok(split);
            }
        }
        Err(RpcError::SplitNotFound(format!(
            "{name}@{}",
            host.unwrap_or(&self.public_domain)
        )))
    }
}

/// All routes, with permissive CORS so browser wallets can fetch pay
/// requests.
pub fn router(state: Arc<RpcState>) -> Router {
    Router::new()
        .route("/lnurlp/:name", get(handlers::pay_request))
        .route("/.well-known/lnurlp/:name", get(handlers::pay_request))
        .route("/lnurlp-callback/:name", get(handlers::pay_callback))
        .route(
            "/webhook/:split_id/:id",
            get(handlers::payment_webhook).post(handlers::payment_webhook),
        )
        .route("/metrics", get(handlers::metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    pub state: Arc<RpcState>,
}

impl RpcServer {
    pub fn with_state(port: u16, state: Arc<RpcState>) -> Self {
        Self { port, state }
    }

    /// Bind to the configured port and serve until `shutdown` fires.
    pub async fn start(&self, shutdown: ShutdownSignal) -> Result<(), RpcError> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {addr}: {e}")))?;
        tracing::info!(addr = %addr, "HTTP server listening");
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), RpcError> {
        axum::serve(listener, router(Arc::clone(&self.state)))
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
