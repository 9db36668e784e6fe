//! Kholodok Webhook 服务
//!
//! 长驻进程：所有请求共享同一个 Engine（及其存储连接池）。
//!
//! 环境变量:
//! - KHOLODOK__TELEGRAM__TOKEN: Bot token
//! - KHOLODOK__TELEGRAM__DEVELOPER_CHAT_ID: 接收错误告警的 chat id
//! - KHOLODOK__STORE__DATABASE_URL: SQLite 连接串（默认 data/kholodok.db）
//!
//! 启动: cargo run --bin kholodok-webhook --features webhook

#[cfg(feature = "webhook")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::Context;
    use axum::{
        extract::State,
        http::StatusCode,
        routing::{get, post},
        Router,
    };
    use kholodok::{bot, config::load_config, observability, Engine};

    observability::init();
    let _ = std::fs::create_dir_all("data");

    let config = load_config(std::env::var("KHOLODOK_CONFIG").ok().map(PathBuf::from))
        .context("Failed to load config")?;
    let (engine, store) = bot::engine_from_config(&config).await?;
    let engine = Arc::new(engine);

    async fn webhook(State(engine): State<Arc<Engine>>, body: String) -> (StatusCode, String) {
        match engine.handle_webhook_body(&body).await {
            Ok(response) => (
                StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK),
                response.body,
            ),
            Err(e) => {
                tracing::error!("Webhook processing failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "\"ERROR\"".to_string())
            }
        }
    }

    let app = Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(|| async { "OK" }))
        .with_state(engine);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("Kholodok webhook server listening on http://{}", config.server.bind);
    tracing::info!("Webhook URL: http://YOUR_HOST/webhook");

    axum::serve(listener, app).await?;
    store.close().await;
    Ok(())
}

#[cfg(not(feature = "webhook"))]
fn main() {
    eprintln!("请使用 --features webhook 编译: cargo run --bin kholodok-webhook --features webhook");
    std::process::exit(1);
}
