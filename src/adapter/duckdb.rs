//! DuckDB引擎适配器
//!
//! duckdb的API是同步的，所有语句都放到 `spawn_blocking` 中执行，避免阻塞异步运行时

use super::{ConnectionFactory, NativeConnection};
use crate::error::{QuickPoolError, QuickPoolResult};
use crate::types::{DataValue, Row};
use ::duckdb::types::Value as DuckValue;
use async_trait::async_trait;
use parking_lot::Mutex;
use rat_logger::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

/// DuckDB连接工厂
///
/// 持有一个基础连接，新连接通过 `try_clone` 共享同一个数据库实例
pub struct DuckDbFactory {
    path: String,
    base: Mutex<::duckdb::Connection>,
}

impl DuckDbFactory {
    /// 打开DuckDB数据库
    ///
    /// # 参数
    ///
    /// * `path` - 数据库文件路径，`:memory:` 表示内存数据库
    pub fn open(path: &str) -> QuickPoolResult<Self> {
        let conn = if path == ":memory:" {
            ::duckdb::Connection::open_in_memory()
        } else {
            ::duckdb::Connection::open(path)
        }
        .map_err(|e| {
            crate::quick_error!(
                connection_creation,
                crate::i18n::tf(
                    "error.connection_creation",
                    &[("engine", "duckdb"), ("message", &e.to_string())]
                )
            )
        })?;

        info!("打开DuckDB数据库: {}", path);

        Ok(Self {
            path: path.to_string(),
            base: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl ConnectionFactory for DuckDbFactory {
    fn engine_name(&self) -> &'static str {
        "duckdb"
    }

    async fn connect(&self) -> QuickPoolResult<Box<dyn NativeConnection>> {
        let conn = self.base.lock().try_clone().map_err(|e| {
            crate::quick_error!(
                connection_creation,
                crate::i18n::tf(
                    "error.connection_creation",
                    &[("engine", "duckdb"), ("message", &e.to_string())]
                )
            )
        })?;
        debug!("创建DuckDB连接: {}", self.path);
        Ok(Box::new(DuckDbConnection {
            conn: Arc::new(Mutex::new(conn)),
        }))
    }
}

/// DuckDB原生连接
pub struct DuckDbConnection {
    // 阻塞任务持有一份引用，调用方放弃等待时语句仍会执行完毕，连接不会丢失
    conn: Arc<Mutex<::duckdb::Connection>>,
}

impl DuckDbConnection {
    /// 在阻塞线程上使用连接执行闭包
    async fn run_blocking<T, F>(&mut self, work: F) -> QuickPoolResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&::duckdb::Connection) -> QuickPoolResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            work(&conn)
        })
        .await
        .map_err(|e| {
            crate::quick_error!(
                connection,
                crate::i18n::tf("error.blocking_task", &[("message", &e.to_string())])
            )
        })?
    }
}

/// 将DataValue转换为DuckDB参数
fn to_duck_value(value: &DataValue) -> DuckValue {
    match value {
        DataValue::Null => DuckValue::Null,
        DataValue::Bool(b) => DuckValue::Boolean(*b),
        DataValue::Int(i) => DuckValue::BigInt(*i),
        DataValue::Float(f) => DuckValue::Double(*f),
        DataValue::String(s) => DuckValue::Text(s.clone()),
        DataValue::Bytes(bytes) => DuckValue::Blob(bytes.clone()),
        DataValue::DateTime(dt) => DuckValue::Text(dt.to_rfc3339()),
        DataValue::Uuid(uuid) => DuckValue::Text(uuid.to_string()),
        DataValue::Json(json) => DuckValue::Text(json.to_string()),
    }
}

/// 读取一列的值，依次尝试常见类型
fn column_value(row: &::duckdb::Row<'_>, idx: usize) -> DataValue {
    if let Ok(v) = row.get::<_, Option<i64>>(idx) {
        return v.map(DataValue::Int).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.get::<_, Option<f64>>(idx) {
        return v.map(DataValue::Float).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.get::<_, Option<String>>(idx) {
        return v.map(DataValue::String).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.get::<_, Option<bool>>(idx) {
        return v.map(DataValue::Bool).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.get::<_, Option<Vec<u8>>>(idx) {
        return v.map(DataValue::Bytes).unwrap_or(DataValue::Null);
    }
    DataValue::Null
}

fn query_error(e: ::duckdb::Error) -> QuickPoolError {
    crate::quick_error!(query, e)
}

#[async_trait]
impl NativeConnection for DuckDbConnection {
    fn engine_name(&self) -> &'static str {
        "duckdb"
    }

    async fn query(&mut self, sql: &str, params: &[DataValue]) -> QuickPoolResult<Vec<Row>> {
        let sql = sql.to_string();
        let values: Vec<DuckValue> = params.iter().map(to_duck_value).collect();

        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(query_error)?;
            let mut rows = stmt
                .query(::duckdb::params_from_iter(values))
                .map_err(query_error)?;

            let column_names: Vec<String> = rows
                .as_ref()
                .map(|r| r.column_names().iter().map(|s| s.to_string()).collect())
                .unwrap_or_default();

            let mut result = Vec::new();
            while let Some(row) = rows.next().map_err(query_error)? {
                let mut map = HashMap::with_capacity(column_names.len());
                for (idx, name) in column_names.iter().enumerate() {
                    map.insert(name.clone(), column_value(row, idx));
                }
                result.push(map);
            }
            Ok(result)
        })
        .await
    }

    async fn execute(&mut self, sql: &str, params: &[DataValue]) -> QuickPoolResult<u64> {
        let sql = sql.to_string();
        let values: Vec<DuckValue> = params.iter().map(to_duck_value).collect();

        self.run_blocking(move |conn| {
            conn.execute(&sql, ::duckdb::params_from_iter(values))
                .map(|affected| affected as u64)
                .map_err(query_error)
        })
        .await
    }

    async fn close(self: Box<Self>) -> QuickPoolResult<()> {
        let conn = self.conn;
        tokio::task::spawn_blocking(move || match Arc::try_unwrap(conn) {
            Ok(conn) => conn.into_inner().close().map_err(|(_, e)| e),
            // 被放弃的语句仍在执行，执行完毕后连接随最后一份引用一起释放
            Err(_) => Ok(()),
        })
        .await
        .map_err(|e| {
            crate::quick_error!(
                connection,
                crate::i18n::tf("error.blocking_task", &[("message", &e.to_string())])
            )
        })?
        .map_err(|e| crate::quick_error!(connection, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cloned_connections_share_database() {
        let factory = DuckDbFactory::open(":memory:").expect("打开数据库失败");
        let mut writer = factory.connect().await.expect("连接失败");
        let mut reader = factory.connect().await.expect("连接失败");

        writer
            .execute("CREATE TABLE metrics (name VARCHAR, value DOUBLE)", &[])
            .await
            .expect("建表失败");
        let affected = writer
            .execute(
                "INSERT INTO metrics VALUES (?, ?)",
                &[DataValue::from("latency"), DataValue::Float(12.5)],
            )
            .await
            .expect("插入失败");
        assert_eq!(affected, 1);

        let rows = reader
            .query("SELECT name, value FROM metrics", &[])
            .await
            .expect("查询失败");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DataValue::String("latency".into()));
        assert_eq!(rows[0]["value"], DataValue::Float(12.5));

        writer.close().await.expect("关闭失败");
        reader.close().await.expect("关闭失败");
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let factory = DuckDbFactory::open(":memory:").expect("打开数据库失败");
        let mut conn = factory.connect().await.expect("连接失败");

        conn.execute("CREATE TABLE t (id BIGINT)", &[])
            .await
            .expect("建表失败");
        conn.begin().await.expect("开启事务失败");
        conn.execute("INSERT INTO t VALUES (1)", &[])
            .await
            .expect("插入失败");
        conn.rollback().await.expect("回滚失败");

        let rows = conn
            .query("SELECT count(*) AS n FROM t", &[])
            .await
            .expect("查询失败");
        assert_eq!(rows[0]["n"].as_i64(), Some(0));
    }

    #[tokio::test]
    async fn test_abandoned_query_keeps_connection_usable() {
        let factory = DuckDbFactory::open(":memory:").expect("打开数据库失败");
        let config = crate::PoolConfig::builder()
            .min_connections(1)
            .max_connections(1)
            .build()
            .expect("配置无效");
        let pool = crate::ConnectionPool::new(Arc::new(factory), config)
            .await
            .expect("创建连接池失败");

        // 语句开始在阻塞线程上执行后放弃等待
        let mut slow = Box::pin(pool.query("SELECT count(*) AS n FROM range(50000000)", &[]));
        let _ = futures::poll!(&mut slow);
        drop(slow);

        let rows = pool
            .query("SELECT 1 AS ok", &[])
            .await
            .expect("放弃的语句不应影响后续查询");
        assert_eq!(rows[0]["ok"].as_i64(), Some(1));

        let stats = pool.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.total_closed, 0);
        pool.close().await;
    }
}
