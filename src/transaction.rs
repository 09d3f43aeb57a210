//! 事务协调器
//!
//! 在单个池化连接上执行一段工作：开启事务，成功则提交，失败则回滚，
//! 无论结果如何连接都会归还给连接池

use crate::error::QuickPoolError;
use crate::pool::{ConnectionPool, PooledConnection};
use futures::future::BoxFuture;
use rat_logger::{debug, error, warn};
use std::fmt::Display;

/// 事务协调器
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    pool: ConnectionPool,
}

impl TransactionCoordinator {
    /// 创建事务协调器
    ///
    /// # 参数
    ///
    /// * `pool` - 提供连接的连接池
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// 所使用的连接池
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// 在事务中执行工作
    ///
    /// 工作成功时提交并返回其结果；提交失败返回 `CommitError`。
    /// 工作失败时回滚并原样返回工作的错误，回滚本身的失败只记录日志。
    /// 提交或回滚失败的连接不会放回连接池
    ///
    /// ```ignore
    /// let id = coordinator
    ///     .transaction(|conn| {
    ///         Box::pin(async move {
    ///             conn.execute("INSERT INTO users (name) VALUES (?)", &["alice".into()]).await?;
    ///             Ok::<_, QuickPoolError>(1)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut PooledConnection) -> BoxFuture<'c, Result<T, E>>,
        E: From<QuickPoolError> + Display,
    {
        let mut conn = self.pool.acquire().await?;

        if let Err(e) = conn.begin().await {
            error!("开启事务失败 (连接={}): {}", conn.id(), e);
            conn.release();
            return Err(e.into());
        }
        debug!("连接 {} 开启事务", conn.id());

        let outcome = work(&mut conn).await;

        match outcome {
            Ok(value) => match conn.commit().await {
                Ok(()) => {
                    debug!("连接 {} 提交事务", conn.id());
                    conn.release();
                    Ok(value)
                }
                Err(e) => {
                    error!("提交事务失败 (连接={}): {}", conn.id(), e);
                    conn.release();
                    Err(QuickPoolError::CommitError {
                        message: e.to_string(),
                    }
                    .into())
                }
            },
            Err(work_error) => {
                warn!("事务执行失败，回滚 (连接={}): {}", conn.id(), work_error);
                if let Err(e) = conn.rollback().await {
                    let rollback_error = QuickPoolError::RollbackError {
                        message: e.to_string(),
                    };
                    error!("连接 {}: {}", conn.id(), rollback_error);
                }
                conn.release();
                Err(work_error)
            }
        }
    }
}

impl ConnectionPool {
    /// 在事务中执行工作，参见 [`TransactionCoordinator::transaction`]
    pub async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut PooledConnection) -> BoxFuture<'c, Result<T, E>>,
        E: From<QuickPoolError> + Display,
    {
        TransactionCoordinator::new(self.clone()).transaction(work).await
    }
}
