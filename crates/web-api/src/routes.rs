use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::{error::ApiError, state::AppState, ws_connection};

/// WebSocket 连接查询参数
#[derive(Debug, Deserialize)]
struct WebSocketQuery {
    /// 承载凭证
    token: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 准入握手
///
/// 任何事件处理之前必须出示有效凭证；缺失或无效的凭证在升级前
/// 就被拒绝，不产生部分会话。
async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WebSocketQuery>,
) -> Result<Response, ApiError> {
    let user_id = state.verifier.verify(&query.token).await.map_err(|err| {
        warn!(error = %err, "websocket upgrade rejected: invalid credential");
        ApiError::from(err)
    })?;

    let identity = state
        .users
        .user_by_id(user_id)
        .await
        .map_err(|err| ApiError::internal_server_error(err.to_string()))?
        .ok_or_else(|| {
            warn!(user_id = %user_id, "websocket upgrade rejected: unknown user");
            ApiError::unauthorized("User not found")
        })?;

    Ok(ws.on_upgrade(move |socket| ws_connection::run(socket, identity, state)))
}
