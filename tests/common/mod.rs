//! 集成测试共用的替身：计数执行器、记录型 Messenger / Notifier、临时 SQLite 库

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kholodok::messaging::{DeliveryError, Messenger, Notifier, OutboundMessage, ReplyTarget};
use kholodok::router::{Dispatcher, Update};
use kholodok::store::{BoundQuery, RetryPolicy, SqliteExecutor, StoreError, StoreExecutor, TableSchema};
use kholodok::{Engine, EngineBuilder};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// 包装真实执行器，按是否涉及文档列统计状态读写次数
pub struct CountingExecutor {
    inner: SqliteExecutor,
    data_column: String,
    state_reads: AtomicUsize,
    state_writes: AtomicUsize,
    other_writes: AtomicUsize,
}

impl CountingExecutor {
    pub fn reads(&self) -> usize {
        self.state_reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.state_writes.load(Ordering::SeqCst)
    }

    pub fn other_writes(&self) -> usize {
        self.other_writes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.state_reads.store(0, Ordering::SeqCst);
        self.state_writes.store(0, Ordering::SeqCst);
        self.other_writes.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreExecutor for CountingExecutor {
    async fn fetch_texts(&self, query: &BoundQuery) -> Result<Vec<Option<String>>, StoreError> {
        if query.sql().contains(&self.data_column) {
            self.state_reads.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.fetch_texts(query).await
    }

    async fn execute(&self, query: &BoundQuery) -> Result<u64, StoreError> {
        if query.sql().contains(&self.data_column) {
            self.state_writes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.other_writes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.execute(query).await
    }
}

#[derive(Debug, Clone)]
pub enum Delivered {
    Reply(ReplyTarget, OutboundMessage),
    Sent(i64, OutboundMessage),
}

impl Delivered {
    pub fn message(&self) -> &OutboundMessage {
        match self {
            Delivered::Reply(_, m) | Delivered::Sent(_, m) => m,
        }
    }
}

/// 记录所有投递；fail_next 设置后下一次投递返回该错误
#[derive(Default)]
pub struct RecordingMessenger {
    delivered: Mutex<Vec<Delivered>>,
    fail_with: Mutex<Option<DeliveryError>>,
}

impl RecordingMessenger {
    pub fn fail_next(&self, error: DeliveryError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.delivered().iter().map(|d| d.message().text.clone()).collect()
    }

    pub fn clear(&self) {
        self.delivered.lock().unwrap().clear();
    }

    fn record(&self, item: Delivered) -> Result<(), DeliveryError> {
        if let Some(err) = self.fail_with.lock().unwrap().take() {
            return Err(err);
        }
        self.delivered.lock().unwrap().push(item);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn deliver(&self, target: &ReplyTarget, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.record(Delivered::Reply(target.clone(), message.clone()))
    }

    async fn send(&self, chat_id: i64, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.record(Delivered::Sent(chat_id, message.clone()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, html: &str) {
        self.messages.lock().unwrap().push(html.to_string());
    }
}

/// 临时目录中的 SQLite 文件库
pub struct TestStore {
    _dir: TempDir,
    pub pool: SqlitePool,
    pub executor: Arc<CountingExecutor>,
    pub schema: TableSchema,
}

impl TestStore {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("state.db").display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();

        let schema = TableSchema::new("users", "user_id", "persistence_data")
            .unwrap()
            .with_secondary("meetings_ts")
            .unwrap();
        let inner = SqliteExecutor::new(pool.clone(), RetryPolicy::default());
        inner
            .execute(&BoundQuery::new(schema.create_table_sql()))
            .await
            .unwrap();

        Self {
            _dir: dir,
            pool,
            executor: Arc::new(CountingExecutor {
                inner,
                data_column: schema.data_column().to_string(),
                state_reads: AtomicUsize::new(0),
                state_writes: AtomicUsize::new(0),
                other_writes: AtomicUsize::new(0),
            }),
            schema,
        }
    }

    /// (persistence_data, meetings_ts, usage)；行不存在时为 None
    pub async fn row(&self, user_id: i64) -> Option<(Option<String>, Option<String>, Option<i64>)> {
        sqlx::query_as::<_, (Option<String>, Option<String>, Option<i64>)>(
            "SELECT persistence_data, meetings_ts, usage FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap()
    }

    pub async fn document(&self, user_id: i64) -> Option<String> {
        self.row(user_id).await.and_then(|(doc, _, _)| doc)
    }

    pub async fn put_document(&self, user_id: i64, document: &str) {
        sqlx::query("INSERT INTO users (user_id, first_name, persistence_data) VALUES (?, 'Test', ?)")
            .bind(user_id)
            .bind(document)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn set_meetings_ts(&self, user_id: i64, ts: &str) {
        sqlx::query("UPDATE users SET meetings_ts = ? WHERE user_id = ?")
            .bind(ts)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

pub struct Harness {
    pub store: TestStore,
    pub messenger: Arc<RecordingMessenger>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: Engine,
}

impl Harness {
    pub async fn new(dispatcher: Dispatcher) -> Self {
        let store = TestStore::new().await;
        let messenger = Arc::new(RecordingMessenger::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = EngineBuilder::new()
            .with_dispatcher(dispatcher)
            .with_store(store.executor.clone(), store.schema.clone())
            .with_messenger(messenger.clone())
            .with_notifier(notifier.clone())
            .with_apology("sorry")
            .build()
            .unwrap();
        Self {
            store,
            messenger,
            notifier,
            engine,
        }
    }
}

pub fn text_update(user_id: u64, text: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "from": {"id": user_id, "first_name": "Anna", "last_name": "K", "username": "anna"},
            "chat": {"id": user_id, "type": "private"},
            "text": text
        }
    }))
    .unwrap()
}

pub fn callback_update(user_id: u64, data: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": 2,
        "callback_query": {
            "id": "cb",
            "from": {"id": user_id, "first_name": "Anna", "last_name": "K"},
            "message": {"message_id": 50, "chat": {"id": user_id, "type": "private"}, "text": "menu"},
            "data": data
        }
    }))
    .unwrap()
}

pub fn photo_update(user_id: u64, caption: &str, media_group: Option<&str>) -> Update {
    let mut message = serde_json::json!({
        "message_id": 11,
        "from": {"id": user_id, "first_name": "Anna"},
        "chat": {"id": user_id, "type": "private"},
        "photo": [{"file_id": "small"}, {"file_id": "large"}],
        "caption": caption
    });
    if let Some(group) = media_group {
        message["media_group_id"] = serde_json::json!(group);
    }
    serde_json::from_value(serde_json::json!({"update_id": 3, "message": message})).unwrap()
}
