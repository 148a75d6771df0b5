//! HTTP Layer - 命令 API + 中继 WebSocket
//!
//! 命令与查询以 JSON POST 暴露；网关与语音中继通过 WebSocket 接入

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use server::{router, HttpServer, MAX_BODY_BYTES};
pub use state::AppState;
