//! WebSocket Handlers - 网关与语音中继接入
//!
//! - /ws/gateway: 网关进程推送平台事件
//! - /ws/voice:   语音中继收发控制消息与音频帧

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::infrastructure::adapters::{GatewayEvent, RelayFrame, VoiceRelayEvent};
use crate::infrastructure::http::state::AppState;

/// 网关中继连接
pub async fn gateway_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_gateway_socket(socket, state))
}

/// 语音中继连接
pub async fn voice_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_voice_socket(socket, state))
}

/// 每个事件在独立任务中分发，缓存更新保持到达顺序
fn ingest_gateway_text(state: &Arc<AppState>, text: &str) {
    let event = match serde_json::from_str::<GatewayEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed gateway event");
            return;
        }
    };

    let Some(event) = state.gateway.ingest(event) else {
        return;
    };
    let dispatcher = Arc::clone(&state.dispatcher);
    tokio::spawn(async move {
        if let Err(e) = dispatcher.dispatch(event).await {
            tracing::error!(error = %e, "Failed to handle gateway event");
        }
    });
}

async fn handle_gateway_socket(socket: WebSocket, state: Arc<AppState>) {
    let (_sender, mut receiver) = socket.split();
    tracing::info!("Gateway relay connected");

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => ingest_gateway_text(&state, &text),
            Ok(Message::Close(_)) => {
                tracing::info!("Gateway relay closed connection");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Gateway WebSocket error");
                break;
            }
            _ => {}
        }
    }

    tracing::info!("Gateway relay disconnected");
}

async fn handle_voice_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (generation, mut outbound) = state.voice_relay.attach();

    // 出站：控制消息为 JSON 文本，音频为二进制帧
    let forward_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let msg = match frame {
                RelayFrame::Control(control) => match serde_json::to_string(&control) {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize voice control");
                        continue;
                    }
                },
                RelayFrame::Audio { guild_id, payload } => {
                    Message::Binary(RelayFrame::encode_audio(guild_id, &payload))
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(error = %e, "Failed to send voice relay message");
                break;
            }
        }
    });

    let relay = Arc::clone(&state.voice_relay);
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<VoiceRelayEvent>(&text) {
                    Ok(event) => relay.handle_event(event),
                    Err(e) => tracing::warn!(error = %e, "Ignoring malformed voice relay message"),
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("Voice relay closed connection");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Voice WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 等待任一任务完成
    tokio::select! {
        _ = forward_task => {}
        _ = receive_task => {}
    }

    state.voice_relay.detach(generation);
}
