//! SQLite引擎适配器
//!
//! 使用sqlx库实现真实的SQLite数据库操作，每个池化连接对应一个独立的 `SqliteConnection`

use super::{ConnectionFactory, NativeConnection};
use crate::error::{QuickPoolError, QuickPoolResult};
use crate::types::{DataValue, Row};
use async_trait::async_trait;
use rat_logger::{debug, info};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row as _, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite连接工厂
pub struct SqliteFactory {
    path: String,
    options: SqliteConnectOptions,
}

impl SqliteFactory {
    /// 创建SQLite连接工厂
    ///
    /// `:memory:` 会创建一个共享缓存的内存数据库，同一工厂创建的所有连接看到同一份数据
    ///
    /// # 参数
    ///
    /// * `path` - 数据库文件路径
    /// * `create_if_missing` - 文件不存在时是否自动创建
    pub fn new(path: &str, create_if_missing: bool) -> QuickPoolResult<Self> {
        let options = if path == ":memory:" {
            info!("使用SQLite内存数据库");
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                crate::quick_error!(
                    config,
                    crate::i18n::tf(
                        "error.connection_creation",
                        &[("engine", "sqlite"), ("message", &e.to_string())]
                    )
                )
            })?
        } else {
            let file_exists = Path::new(path).exists();

            // 如果文件不存在且不允许创建，则返回错误
            if !file_exists && !create_if_missing {
                return Err(crate::quick_error!(
                    config,
                    crate::i18n::tf("error.sqlite_file_not_found", &[("path", path)])
                ));
            }

            // 如果需要创建文件且文件不存在，则创建父目录
            if !file_exists {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
            }

            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(create_if_missing)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(Self {
            path: path.to_string(),
            options,
        })
    }
}

#[async_trait]
impl ConnectionFactory for SqliteFactory {
    fn engine_name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> QuickPoolResult<Box<dyn NativeConnection>> {
        let conn = self.options.connect().await.map_err(|e| {
            crate::quick_error!(
                connection_creation,
                crate::i18n::tf(
                    "error.connection_creation",
                    &[("engine", "sqlite"), ("message", &e.to_string())]
                )
            )
        })?;
        debug!("创建SQLite连接: {}", self.path);
        Ok(Box::new(SqliteConnection { conn }))
    }
}

/// SQLite原生连接
pub struct SqliteConnection {
    conn: sqlx::sqlite::SqliteConnection,
}

impl SqliteConnection {
    /// 绑定语句参数
    fn bind_params<'q>(sql: &'q str, params: &'q [DataValue]) -> SqliteQuery<'q> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = match param {
                DataValue::Null => query.bind(Option::<String>::None),
                DataValue::Bool(b) => query.bind(i32::from(*b)), // SQLite使用整数表示布尔值
                DataValue::Int(i) => query.bind(*i),
                DataValue::Float(f) => query.bind(*f),
                DataValue::String(s) => query.bind(s.as_str()),
                DataValue::Bytes(bytes) => query.bind(bytes.as_slice()),
                DataValue::DateTime(dt) => query.bind(*dt),
                DataValue::Uuid(uuid) => query.bind(uuid.to_string()),
                DataValue::Json(json) => query.bind(json.to_string()),
            };
        }
        query
    }

    /// 将sqlx的行转换为DataValue映射
    fn row_to_data_map(row: &SqliteRow) -> Row {
        let mut map = HashMap::new();

        for column in row.columns() {
            let column_name = column.name();

            // 尝试获取不同类型的值
            let data_value = if let Ok(value) = row.try_get::<Option<String>, _>(column_name) {
                value.map(DataValue::String).unwrap_or(DataValue::Null)
            } else if let Ok(value) = row.try_get::<Option<i64>, _>(column_name) {
                value.map(DataValue::Int).unwrap_or(DataValue::Null)
            } else if let Ok(value) = row.try_get::<Option<f64>, _>(column_name) {
                value.map(DataValue::Float).unwrap_or(DataValue::Null)
            } else if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(column_name) {
                value.map(DataValue::Bytes).unwrap_or(DataValue::Null)
            } else {
                DataValue::Null
            };

            map.insert(column_name.to_string(), data_value);
        }

        map
    }
}

fn query_error(e: sqlx::Error) -> QuickPoolError {
    crate::quick_error!(query, e)
}

#[async_trait]
impl NativeConnection for SqliteConnection {
    fn engine_name(&self) -> &'static str {
        "sqlite"
    }

    async fn query(&mut self, sql: &str, params: &[DataValue]) -> QuickPoolResult<Vec<Row>> {
        let rows = Self::bind_params(sql, params)
            .fetch_all(&mut self.conn)
            .await
            .map_err(query_error)?;
        Ok(rows.iter().map(Self::row_to_data_map).collect())
    }

    async fn execute(&mut self, sql: &str, params: &[DataValue]) -> QuickPoolResult<u64> {
        let result = Self::bind_params(sql, params)
            .execute(&mut self.conn)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }

    async fn close(self: Box<Self>) -> QuickPoolResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| crate::quick_error!(connection, e))
    }
}
