//! 集成测试支撑：内存协作方假实现 + 启动测试服务器的工具。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TtMessage, MaybeTlsStream, WebSocketStream,
};
use uuid::Uuid;

use application::{EventHub, SystemClock};
use config::AuthConfig;
use domain::{
    ChannelAccessFact, ChannelDirectory, ChannelId, EventError, PresenceStatus, StatusStore,
    UserDirectory, UserId, UserIdentity,
};
use infrastructure::JwtCredentialVerifier;
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 内存用户目录
pub struct InMemoryUserDirectory {
    users: HashMap<UserId, UserIdentity>,
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn user_by_id(&self, user_id: UserId) -> Result<Option<UserIdentity>, EventError> {
        Ok(self.users.get(&user_id).cloned())
    }
}

/// 内存频道目录
pub struct InMemoryChannelDirectory {
    channels: HashMap<ChannelId, ChannelAccessFact>,
}

#[async_trait]
impl ChannelDirectory for InMemoryChannelDirectory {
    async fn channel_access(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<ChannelAccessFact>, EventError> {
        Ok(self.channels.get(&channel_id).copied())
    }
}

/// 丢弃写入的状态存储
pub struct NullStatusStore;

#[async_trait]
impl StatusStore for NullStatusStore {
    async fn set_user_status(
        &self,
        _user_id: UserId,
        _status: PresenceStatus,
    ) -> Result<(), EventError> {
        Ok(())
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    verifier: Arc<JwtCredentialVerifier>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub fn token_for(&self, user_id: UserId) -> String {
        self.verifier.issue(user_id).expect("issue token")
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// 以给定用户身份建立 WebSocket 连接
    pub async fn connect(&self, user_id: UserId) -> WsClient {
        let token = self.token_for(user_id);
        let (ws, _) = connect_async(self.ws_url(&token))
            .await
            .expect("ws connect");
        ws
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// 启动一个使用内存协作方的测试服务器
pub async fn spawn_app(users: Vec<UserIdentity>, channels: Vec<ChannelAccessFact>) -> TestApp {
    let verifier = Arc::new(JwtCredentialVerifier::new(&AuthConfig {
        jwt_secret: "integration-test-secret-at-least-32-chars".to_string(),
        token_expiry_hours: 1,
    }));

    let users = InMemoryUserDirectory {
        users: users.into_iter().map(|u| (u.id, u)).collect(),
    };
    let channels = InMemoryChannelDirectory {
        channels: channels.into_iter().map(|c| (c.channel_id, c)).collect(),
    };

    let hub = Arc::new(EventHub::new(
        Arc::new(channels),
        Arc::new(NullStatusStore),
        Arc::new(SystemClock),
    ));
    let state = AppState::new(hub, verifier.clone(), Arc::new(users));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestApp {
        addr,
        verifier,
        shutdown_tx: Some(shutdown_tx),
    }
}

pub fn identity(name: &str) -> UserIdentity {
    UserIdentity {
        id: UserId::new(Uuid::new_v4()),
        username: name.to_string(),
        avatar: None,
    }
}

/// 发送一个 `{kind, payload}` 帧
pub async fn send_frame(ws: &mut WsClient, kind: &str, payload: Value) {
    let frame = serde_json::json!({"kind": kind, "payload": payload});
    ws.send(TtMessage::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// 等待下一个指定种类的事件，跳过其它事件
pub async fn wait_for(ws: &mut WsClient, kind: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let message = ws
                .next()
                .await
                .expect("stream ended while waiting for event")
                .expect("websocket frame");

            if let TtMessage::Text(text) = message {
                let value: Value = serde_json::from_str(text.as_str()).expect("event json");
                if value["kind"] == kind {
                    return value["payload"].clone();
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}
