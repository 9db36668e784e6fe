//! 表结构与参数化查询
//!
//! 表名、列名来自配置，构造时校验为普通 SQL 标识符后才会拼入查询文本；
//! 所有用户值（user id、文档、姓名）一律作为绑定参数传递。

use crate::config::ColumnsSection;

use super::{StoreError, UserId};

/// 绑定参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Text(String),
    Null,
}

/// 查询文本 + 按位置绑定的参数（占位符统一为 `?`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    sql: String,
    params: Vec<Param>,
}

impl BoundQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn bind_opt_text(self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.bind(Param::Text(v.to_string())),
            None => self.bind(Param::Null),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// 用户表结构：状态文档列、可选的派生时间戳列、用户目录相关列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
    user_id: String,
    data: String,
    secondary: Option<String>,
    first_name: String,
    last_name: String,
    username: String,
    usage: String,
}

impl TableSchema {
    /// 仅指定状态相关列，用户目录列使用默认名
    pub fn new(table: &str, user_id: &str, data: &str) -> Result<Self, StoreError> {
        let defaults = ColumnsSection::default();
        Ok(Self {
            table: validate_identifier(table)?,
            user_id: validate_identifier(user_id)?,
            data: validate_identifier(data)?,
            secondary: None,
            first_name: defaults.first_name,
            last_name: defaults.last_name,
            username: defaults.username,
            usage: defaults.usage,
        })
    }

    /// 出错擦除时需要一并置空的派生列
    pub fn with_secondary(mut self, column: &str) -> Result<Self, StoreError> {
        self.secondary = Some(validate_identifier(column)?);
        Ok(self)
    }

    pub fn from_config(columns: &ColumnsSection) -> Result<Self, StoreError> {
        Ok(Self {
            table: validate_identifier(&columns.users_table)?,
            user_id: validate_identifier(&columns.user_id)?,
            data: validate_identifier(&columns.data)?,
            secondary: columns
                .meetings_ts
                .as_deref()
                .map(validate_identifier)
                .transpose()?,
            first_name: validate_identifier(&columns.first_name)?,
            last_name: validate_identifier(&columns.last_name)?,
            username: validate_identifier(&columns.username)?,
            usage: validate_identifier(&columns.usage)?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn data_column(&self) -> &str {
        &self.data
    }

    /// `SELECT <data> FROM <table> WHERE <user_id> = ?`
    pub fn select_document(&self, user_id: UserId) -> Result<BoundQuery, StoreError> {
        Ok(BoundQuery::new(format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.data, self.table, self.user_id
        ))
        .bind(bind_user(user_id)?))
    }

    /// 整体覆盖文档列；行不存在时隐式创建
    pub fn upsert_document(&self, user_id: UserId, document: &str) -> Result<BoundQuery, StoreError> {
        Ok(BoundQuery::new(format!(
            "INSERT INTO {table} ({id}, {data}) VALUES (?, ?) \
             ON CONFLICT({id}) DO UPDATE SET {data} = excluded.{data}",
            table = self.table,
            id = self.user_id,
            data = self.data
        ))
        .bind(bind_user(user_id)?)
        .bind(Param::Text(document.to_string())))
    }

    /// 擦除文档列（以及派生列）
    pub fn wipe_document(&self, user_id: UserId) -> Result<BoundQuery, StoreError> {
        let mut assignments = format!("{} = NULL", self.data);
        if let Some(secondary) = &self.secondary {
            assignments.push_str(&format!(", {} = NULL", secondary));
        }
        Ok(BoundQuery::new(format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, assignments, self.user_id
        ))
        .bind(bind_user(user_id)?))
    }

    /// 注册用户：姓氏与用户名缺失时保留已有值
    pub fn upsert_user(
        &self,
        user_id: UserId,
        first_name: &str,
        last_name: Option<&str>,
        username: Option<&str>,
    ) -> Result<BoundQuery, StoreError> {
        Ok(BoundQuery::new(format!(
            "INSERT INTO {table} ({id}, {first}, {last}, {username}) VALUES (?, ?, ?, ?) \
             ON CONFLICT({id}) DO UPDATE SET \
             {first} = excluded.{first}, \
             {last} = COALESCE(excluded.{last}, {table}.{last}), \
             {username} = COALESCE(excluded.{username}, {table}.{username})",
            table = self.table,
            id = self.user_id,
            first = self.first_name,
            last = self.last_name,
            username = self.username
        ))
        .bind(bind_user(user_id)?)
        .bind(Param::Text(first_name.to_string()))
        .bind_opt_text(last_name)
        .bind_opt_text(username))
    }

    pub fn increment_usage(&self, user_id: UserId) -> Result<BoundQuery, StoreError> {
        Ok(BoundQuery::new(format!(
            "UPDATE {table} SET {usage} = COALESCE({usage}, 0) + 1 WHERE {id} = ?",
            table = self.table,
            usage = self.usage,
            id = self.user_id
        ))
        .bind(bind_user(user_id)?))
    }

    /// 本地部署用的建表语句（不含任何用户值）
    pub fn create_table_sql(&self) -> String {
        let mut columns = vec![
            format!("{} INTEGER PRIMARY KEY", self.user_id),
            format!("{} TEXT", self.first_name),
            format!("{} TEXT", self.last_name),
            format!("{} TEXT", self.username),
            format!("{} INTEGER", self.usage),
            format!("{} TEXT", self.data),
        ];
        if let Some(secondary) = &self.secondary {
            columns.push(format!("{} TEXT", secondary));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            columns.join(", ")
        )
    }
}

fn bind_user(user_id: UserId) -> Result<Param, StoreError> {
    i64::try_from(user_id)
        .map(Param::Int)
        .map_err(|_| StoreError::IdentityOutOfRange(user_id))
}

/// 只允许 `[A-Za-z_][A-Za-z0-9_]*`
fn validate_identifier(name: &str) -> Result<String, StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(name.to_string())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
