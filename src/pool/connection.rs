//! 池化连接句柄
//!
//! `PooledConnection` 独占一个借出的原生连接，归还后句柄即被消费，不可能重复归还。
//! 句柄被丢弃时会自动归还，仍处于事务中的连接则直接关闭

use crate::adapter::NativeConnection;
use crate::debug_log;
use crate::error::{QuickPoolError, QuickPoolResult};
use crate::pool::pool::PoolShared;
use crate::pool::types::{ConnectionId, QueryUsage};
use crate::types::{DataValue, Row};
use rat_logger::warn;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// 从连接池借出的连接
pub struct PooledConnection {
    pub(crate) shared: Arc<PoolShared>,
    id: ConnectionId,
    conn: Option<Box<dyn NativeConnection>>,
    usage: QueryUsage,
    in_transaction: bool,
    discarded: bool,
}

impl PooledConnection {
    pub(crate) fn new(shared: Arc<PoolShared>, id: ConnectionId, conn: Box<dyn NativeConnection>) -> Self {
        Self {
            shared,
            id,
            conn: Some(conn),
            usage: QueryUsage::default(),
            in_transaction: false,
            discarded: false,
        }
    }

    /// 连接ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// 是否处于事务中
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// 引擎名称
    pub fn engine_name(&self) -> &'static str {
        self.shared.factory.engine_name()
    }

    fn native(&mut self) -> QuickPoolResult<&mut (dyn NativeConnection + 'static)> {
        let engine = self.shared.factory.engine_name();
        self.conn.as_deref_mut().ok_or_else(|| {
            crate::quick_error!(
                connection,
                crate::i18n::tf("error.connection_closed", &[("engine", engine)])
            )
        })
    }

    /// 执行查询语句
    ///
    /// # 参数
    ///
    /// * `sql` - SQL语句
    /// * `params` - 语句参数
    pub async fn query(&mut self, sql: &str, params: &[DataValue]) -> QuickPoolResult<Vec<Row>> {
        let started = Instant::now();
        let result = self.native()?.query(sql, params).await;
        self.usage.record(started.elapsed());
        debug_log!("连接 {} 执行查询: {}", self.id, sql);
        self.check_broken(result)
    }

    /// 执行无结果集的语句，返回受影响行数
    ///
    /// # 参数
    ///
    /// * `sql` - SQL语句
    /// * `params` - 语句参数
    pub async fn execute(&mut self, sql: &str, params: &[DataValue]) -> QuickPoolResult<u64> {
        let started = Instant::now();
        let result = self.native()?.execute(sql, params).await;
        self.usage.record(started.elapsed());
        debug_log!("连接 {} 执行语句: {}", self.id, sql);
        self.check_broken(result)
    }

    /// 原生连接报告不可用时，归还时直接关闭
    fn check_broken<T>(&mut self, result: QuickPoolResult<T>) -> QuickPoolResult<T> {
        if let Err(QuickPoolError::ConnectionError { message }) = &result {
            warn!("连接 {} 不可用，归还时将关闭: {}", self.id, message);
            self.discarded = true;
        }
        result
    }

    /// 开启事务，不允许嵌套
    pub async fn begin(&mut self) -> QuickPoolResult<()> {
        if self.in_transaction {
            return Err(crate::quick_error!(
                transaction,
                crate::i18n::tf("error.nested_transaction", &[("id", &self.id.to_string())])
            ));
        }
        self.native()?.begin().await?;
        self.in_transaction = true;
        Ok(())
    }

    /// 提交事务
    ///
    /// 提交失败时连接仍标记为事务中，归还时会被关闭而不是放回池中
    pub async fn commit(&mut self) -> QuickPoolResult<()> {
        self.ensure_transaction()?;
        self.native()?.commit().await?;
        self.in_transaction = false;
        Ok(())
    }

    /// 回滚事务
    pub async fn rollback(&mut self) -> QuickPoolResult<()> {
        self.ensure_transaction()?;
        self.native()?.rollback().await?;
        self.in_transaction = false;
        Ok(())
    }

    fn ensure_transaction(&self) -> QuickPoolResult<()> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(crate::quick_error!(
                transaction,
                crate::i18n::tf("error.no_transaction", &[("id", &self.id.to_string())])
            ))
        }
    }

    /// 将连接归还给所属连接池
    pub fn release(mut self) {
        self.return_to_pool();
    }

    /// 关闭连接而不放回池中（例如调用方确认连接已损坏）
    pub fn discard(mut self) {
        self.discarded = true;
        self.return_to_pool();
    }

    /// 取出原生连接，句柄之后不再做任何事
    pub(crate) fn take_native(&mut self) -> Option<Box<dyn NativeConnection>> {
        self.conn.take()
    }

    pub(crate) fn return_to_pool(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let usage = std::mem::take(&mut self.usage);
        if self.in_transaction {
            warn!("连接 {} 归还时仍处于事务中，将直接关闭", self.id);
        }
        let discard = self.in_transaction || self.discarded;

        // 锁内不会丢弃仍持有原生连接的句柄，这里直接加锁不会死锁
        self.shared.release_native(self.id, conn, usage, discard);
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.return_to_pool();
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("engine", &self.shared.factory.engine_name())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

/// 连接创建名额
///
/// 持有期间占用一个容量名额；未登记连接就被丢弃时名额归还，并转交给下一个等待者
pub(crate) struct CreationPermit {
    shared: Option<Arc<PoolShared>>,
}

impl CreationPermit {
    /// 调用方必须已在锁内增加了 `pending_creations`
    pub(crate) fn reserved(shared: Arc<PoolShared>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    /// 名额已在锁内归还，不再执行Drop逻辑
    pub(crate) fn disarm(mut self) {
        self.shared = None;
    }
}

impl Drop for CreationPermit {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        let mut state = shared.state.lock();
        shared.cancel_reservation_locked(&mut state);
    }
}
