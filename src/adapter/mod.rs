//! 数据库引擎适配器模块
//!
//! 连接池只通过这里定义的两个trait与底层引擎交互：
//! `ConnectionFactory` 负责创建原生连接，`NativeConnection` 负责在单个连接上执行语句

use crate::config::EngineConfig;
use crate::error::QuickPoolResult;
use crate::types::{DataValue, Row};
use async_trait::async_trait;
use std::sync::Arc;

// 导入各个引擎适配器 (条件编译)
#[cfg(feature = "duckdb-support")]
mod duckdb;
#[cfg(feature = "sqlite-support")]
mod sqlite;

#[cfg(feature = "duckdb-support")]
pub use self::duckdb::{DuckDbConnection, DuckDbFactory};
#[cfg(feature = "sqlite-support")]
pub use self::sqlite::{SqliteConnection, SqliteFactory};

/// 单个原生数据库连接
///
/// 实现者只需保证同一时刻只被一个调用方使用（连接池通过独占借用保证）
#[async_trait]
pub trait NativeConnection: Send {
    /// 引擎名称
    fn engine_name(&self) -> &'static str;

    /// 执行查询语句并返回所有行
    async fn query(&mut self, sql: &str, params: &[DataValue]) -> QuickPoolResult<Vec<Row>>;

    /// 执行无结果集的语句，返回受影响行数
    async fn execute(&mut self, sql: &str, params: &[DataValue]) -> QuickPoolResult<u64>;

    /// 开启事务
    async fn begin(&mut self) -> QuickPoolResult<()> {
        self.execute("BEGIN TRANSACTION", &[]).await.map(|_| ())
    }

    /// 提交事务
    async fn commit(&mut self) -> QuickPoolResult<()> {
        self.execute("COMMIT", &[]).await.map(|_| ())
    }

    /// 回滚事务
    async fn rollback(&mut self) -> QuickPoolResult<()> {
        self.execute("ROLLBACK", &[]).await.map(|_| ())
    }

    /// 关闭连接
    async fn close(self: Box<Self>) -> QuickPoolResult<()>;
}

/// 原生连接工厂
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// 引擎名称
    fn engine_name(&self) -> &'static str;

    /// 创建一个新的原生连接
    async fn connect(&self) -> QuickPoolResult<Box<dyn NativeConnection>>;
}

/// 根据引擎配置创建连接工厂
#[allow(unreachable_patterns)]
pub fn create_factory(engine: &EngineConfig) -> QuickPoolResult<Arc<dyn ConnectionFactory>> {
    match engine {
        #[cfg(feature = "sqlite-support")]
        EngineConfig::SQLite {
            path,
            create_if_missing,
        } => Ok(Arc::new(SqliteFactory::new(path, *create_if_missing)?)),
        #[cfg(feature = "duckdb-support")]
        EngineConfig::DuckDB { path } => Ok(Arc::new(DuckDbFactory::open(path)?)),
        _ => Err(crate::quick_error!(
            config,
            crate::i18n::tf(
                "error.engine_unavailable",
                &[("engine", engine.engine_name())]
            )
        )),
    }
}
