//! Web API 层。
//!
//! 提供 Axum 路由，把 WebSocket 连接的准入握手和帧收发委托给
//! 应用层的事件中枢。

mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
