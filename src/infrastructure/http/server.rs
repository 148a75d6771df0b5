//! HTTP Server
//!
//! 命令 API 与中继 WebSocket 共用一个监听端口

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::middleware::error_logging_middleware;
use super::routes::create_routes;
use super::state::AppState;
use crate::config::ServerConfig;

/// 请求体上限
///
/// 命令都是几十字节的 JSON；音频只经 `/ws/voice` 出站，不走请求体
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// 组装完整 Router（路由 + 中间件）
///
/// 层顺序：CORS → Trace → 状态码日志 → 请求体上限 → 路由
pub fn router(state: Arc<AppState>) -> Router {
    // 命令只用 GET/POST，预检结果缓存一小时
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    create_routes()
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(error_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// HTTP 服务器
pub struct HttpServer {
    addr: String,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            addr: config.addr(),
            state: Arc::new(state),
        }
    }

    /// 运行直到 `shutdown_signal` 完成；已建立的 WebSocket 随之关闭
    pub async fn run_with_shutdown<F>(self, shutdown_signal: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.addr).await?;
        info!(
            addr = %listener.local_addr()?,
            "Listening for commands on /api and relays on /ws"
        );

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        Ok(())
    }
}
