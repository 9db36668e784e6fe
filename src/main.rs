//! Kholodok 单次调用入口
//!
//! 一个进程处理一个 Update：从文件参数或 stdin 读取请求体，处理后把响应 JSON 打印到 stdout。
//!
//! 启动: cargo run -- update.json   或   cat update.json | cargo run

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use kholodok::{bot, config::load_config, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    // 默认 SQLite 文件放在 data/ 下
    let _ = std::fs::create_dir_all("data");

    let config = load_config(std::env::var("KHOLODOK_CONFIG").ok().map(PathBuf::from))
        .context("Failed to load config")?;

    let body = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("Failed to read {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read update from stdin")?;
            buf
        }
    };

    let (engine, store) = bot::engine_from_config(&config).await?;
    let response = engine
        .handle_webhook_body(&body)
        .await
        .context("Failed to process update")?;
    store.close().await;

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}
