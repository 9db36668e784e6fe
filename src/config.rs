//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `KHOLODOK__*` 覆盖（双下划线表示嵌套，如 `KHOLODOK__STORE__DATABASE_URL=sqlite:bot.db`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [store] 段：行存储连接、表名与列名、重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 从连接池取连接的超时（秒）
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// 启动时是否自动建表（本地 SQLite 部署用）
    #[serde(default = "default_create_schema")]
    pub create_schema: bool,
    #[serde(default)]
    pub columns: ColumnsSection,
    #[serde(default)]
    pub retry: RetrySection,
}

fn default_database_url() -> String {
    "sqlite:data/kholodok.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    3
}

fn default_create_schema() -> bool {
    true
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            create_schema: default_create_schema(),
            columns: ColumnsSection::default(),
            retry: RetrySection::default(),
        }
    }
}

/// [store.columns] 段：用户表及各列名称（只允许普通 SQL 标识符）
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnsSection {
    #[serde(default = "default_users_table")]
    pub users_table: String,
    #[serde(default = "default_user_id_column")]
    pub user_id: String,
    #[serde(default = "default_data_column")]
    pub data: String,
    /// 其他子系统派生的时间戳列，出错擦除时与文档列一起置空
    #[serde(default = "default_meetings_ts_column")]
    pub meetings_ts: Option<String>,
    #[serde(default = "default_first_name_column")]
    pub first_name: String,
    #[serde(default = "default_last_name_column")]
    pub last_name: String,
    #[serde(default = "default_username_column")]
    pub username: String,
    #[serde(default = "default_usage_column")]
    pub usage: String,
}

fn default_users_table() -> String {
    "users".to_string()
}

fn default_user_id_column() -> String {
    "user_id".to_string()
}

fn default_data_column() -> String {
    "persistence_data".to_string()
}

fn default_meetings_ts_column() -> Option<String> {
    Some("meetings_ts".to_string())
}

fn default_first_name_column() -> String {
    "first_name".to_string()
}

fn default_last_name_column() -> String {
    "last_name".to_string()
}

fn default_username_column() -> String {
    "username".to_string()
}

fn default_usage_column() -> String {
    "usage".to_string()
}

impl Default for ColumnsSection {
    fn default() -> Self {
        Self {
            users_table: default_users_table(),
            user_id: default_user_id_column(),
            data: default_data_column(),
            meetings_ts: default_meetings_ts_column(),
            first_name: default_first_name_column(),
            last_name: default_last_name_column(),
            username: default_username_column(),
            usage: default_usage_column(),
        }
    }
}

/// [store.retry] 段：瞬时错误（连接超时、数据库忙）的重试次数与退避
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    1000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// [telegram] 段：Bot API 访问
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    /// Bot token，通常由 KHOLODOK__TELEGRAM__TOKEN 提供
    pub token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// 接收错误告警的开发者 chat id
    pub developer_chat_id: Option<i64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_api_base(),
            developer_chat_id: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// [bot] 段：演示机器人内容相关的外部引用
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BotSection {
    /// 公告频道 chat id（post_channel 会话最终发布的位置）
    pub board_chat_id: Option<i64>,
    /// 公告频道链接（帮助文案中展示）
    pub board_link: Option<String>,
}

/// [server] 段：webhook 监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// 从 config 目录加载配置，环境变量 KHOLODOK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 KHOLODOK__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("KHOLODOK")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.store.columns.users_table, "users");
        assert_eq!(cfg.store.columns.data, "persistence_data");
        assert_eq!(cfg.store.columns.meetings_ts.as_deref(), Some("meetings_ts"));
        assert_eq!(cfg.store.retry.max_attempts, 3);
        assert_eq!(cfg.telegram.api_base, "https://api.telegram.org");
    }

    #[test]
    fn test_toml_overrides_store_section() {
        let toml = r#"
            [store]
            database_url = "sqlite::memory:"
            [store.columns]
            data = "state_blob"
            [store.retry]
            max_attempts = 5
        "#;
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.store.database_url, "sqlite::memory:");
        assert_eq!(cfg.store.columns.data, "state_blob");
        assert_eq!(cfg.store.columns.user_id, "user_id");
        assert_eq!(cfg.store.retry.max_attempts, 5);
        assert_eq!(cfg.store.retry.base_delay_ms, 50);
    }
}
