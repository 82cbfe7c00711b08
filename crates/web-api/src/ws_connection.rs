//! 单条 WebSocket 连接的生命周期管理
//!
//! 收发两端解耦：出站事件经 mpsc 通道由发送任务统一写出，
//! 入站帧在当前任务内交给消息路由器处理。任一端结束即视为
//! 连接断开，触发注册表清理。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use application::ConnectionSession;
use domain::ServerEvent;

use crate::state::AppState;

pub async fn handle_socket(socket: WebSocket, state: AppState) {
    tracing::info!("WebSocket 连接已建立");

    let (mut ws_sender, mut incoming) = socket.split();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();

    // 发送任务：序列化出站事件并写入 socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "序列化出站事件失败");
                    continue;
                }
            };
            if ws_sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
        tracing::info!("WebSocket发送任务结束");
    });

    // 接收循环：入站帧交给路由器，会话状态只在这里变更
    let mut session = ConnectionSession::new();
    while let Some(Ok(message)) = incoming.next().await {
        match message {
            WsMessage::Text(text) => {
                state
                    .chat_router
                    .handle_frame(&mut session, text.as_str(), &event_tx)
                    .await;
            }
            WsMessage::Close(_) => {
                tracing::info!("WebSocket收到关闭消息");
                break;
            }
            // Ping/Pong 由协议栈自动应答
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Binary(_) => {
                tracing::debug!("忽略二进制帧");
            }
        }
    }

    // 断开清理：解除连接绑定并清除在线标记
    state.chat_router.disconnect(&mut session).await;

    // 关闭出站通道让发送任务自然退出
    drop(event_tx);
    if let Err(err) = send_task.await {
        tracing::warn!(error = %err, "发送任务异常退出");
    }

    tracing::info!("WebSocket连接已断开，在线状态已清理");
}
