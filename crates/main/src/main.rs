//! 主应用程序入口
//!
//! 组合根：装配事件中枢与协作方实现，启动清扫器和 Axum 服务。

use std::sync::Arc;
use std::time::Duration;

use application::{EventHub, PresenceSweeper, SystemClock};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, JwtCredentialVerifier, PgChannelDirectory, PgStatusStore, PgUserDirectory,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 加载并校验配置
    let config = AppConfig::load()?;
    config.validate()?;

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').last().unwrap_or("unknown")
    );
    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;

    // 协作方实现
    let verifier = Arc::new(JwtCredentialVerifier::new(&config.auth));
    let users = Arc::new(PgUserDirectory::new(pg_pool.clone()));
    let channels = Arc::new(PgChannelDirectory::new(pg_pool.clone()));
    let status_store = Arc::new(PgStatusStore::new(pg_pool));

    // 事件中枢由组合根持有，没有进程级全局状态
    let hub = Arc::new(EventHub::new(channels, status_store, Arc::new(SystemClock)));

    // 后台在线状态清扫
    let sweeper = PresenceSweeper::spawn(
        hub.clone(),
        Duration::from_secs(config.presence.sweep_interval_secs),
        chrono::Duration::seconds(config.presence.idle_after_secs as i64),
    );

    // 启动 Web 服务器
    let state = AppState::new(hub, verifier, users);
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("实时服务器启动在 http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 关停时取消清扫定时器
    sweeper.shutdown().await;
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
