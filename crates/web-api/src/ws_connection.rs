//! WebSocket 连接主循环
//!
//! 单个连接的帧收发：出站事件经 mpsc 通道由发送任务串行写出，
//! 入站文本帧按到达顺序交给事件中枢分发。任何一侧结束都触发一次
//! 完整的断开清理。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use application::{ErrorNotice, Frame, ServerEvent};
use domain::UserIdentity;

use crate::state::AppState;

pub async fn run(socket: WebSocket, identity: UserIdentity, state: AppState) {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let connection_id = state.hub.connect(identity.clone(), events_tx.clone()).await;

    info!(user_id = %identity.id, connection_id = %connection_id, "websocket session started");

    let (mut sender, mut incoming) = socket.split();

    // 发送任务：出站事件序列化为 JSON 文本帧
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize outbound event");
                    continue;
                }
            };

            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                debug!("websocket sender closed");
                break;
            }
        }
    });

    // 接收任务：入站帧按到达顺序分发，不重排
    let recv_hub = state.hub.clone();
    let recv_identity = identity.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = incoming.next().await {
            match message {
                Ok(WsMessage::Text(text)) => match Frame::parse(text.as_str()) {
                    Ok(frame) => {
                        recv_hub.dispatch(connection_id, &recv_identity, frame).await;
                    }
                    Err(err) => {
                        // 连信封都解析不了的帧：仅回错误应答，连接继续
                        let _ = events_tx.send(ServerEvent::Error(ErrorNotice {
                            event: "unknown".to_string(),
                            message: err.to_string(),
                        }));
                    }
                },
                Ok(WsMessage::Binary(_)) => {
                    debug!("binary frames are not supported");
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                    // 协议层心跳由传输栈处理
                }
                Ok(WsMessage::Close(_)) => {
                    debug!(connection_id = %connection_id, "close frame received");
                    break;
                }
                Err(err) => {
                    debug!(connection_id = %connection_id, error = %err, "websocket read error");
                    break;
                }
            }
        }
    });

    // 任一任务结束即认为连接终止，另一侧立刻停掉，
    // 之后不会再有属于这个连接的事件被分发
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // 无论连接因何终止，清理都是立即且完整的
    state.hub.disconnect(connection_id, &identity).await;
    info!(user_id = %identity.id, connection_id = %connection_id, "websocket session closed");
}
