//! Web服务器

use axum::{routing::get, Router};
use explorer_analytics::CaseRepository;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{
    age_groups, api_root, dimension_range, dimensions, health, profile, surgeries,
    surgery_insights, AppState,
};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, repository: CaseRepository) -> Self {
        let app = create_app(repository);

        Self { addr, app }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start web server: {}", e))?;

        Ok(())
    }
}

/// 组装完整的路由和中间件
pub fn create_app(repository: CaseRepository) -> Router {
    Router::new()
        // 根路径
        .route("/", get(api_root))

        // 健康检查
        .route("/health", get(health))

        // API路由
        .nest("/api/v1", api_routes())
        .with_state(repository)

        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// API v1 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api_root))
        .route("/profile", get(profile))
        .route("/dimensions", get(dimensions))
        .route("/dimensions/:key/range", get(dimension_range))
        .route("/surgeries", get(surgeries))
        .route("/surgeries/:name", get(surgery_insights))
        .route("/age-groups/:decade", get(age_groups))
}
