//! Chat Platform Adapters
//!
//! - HttpPlatformClient: REST 调用
//! - GatewayCache: 网关中继事件与语音在线缓存

mod gateway_cache;
mod http_platform_client;

pub use gateway_cache::{GatewayCache, GatewayEvent};
pub use http_platform_client::{HttpPlatformClient, HttpPlatformClientConfig};
