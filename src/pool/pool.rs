//! 连接池核心模块

use rat_logger::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::connection::{CreationPermit, PooledConnection};
use super::registry::PoolRegistry;
use super::stats::PoolCounters;
use super::types::{ConnectionId, Handoff, QueryUsage};
use super::wait_queue::{WaitQueue, WaiterId};
use crate::adapter::{ConnectionFactory, NativeConnection, create_factory};
use crate::config::{DatabaseConfig, PoolConfig};
use crate::error::{QuickPoolError, QuickPoolResult};

/// 锁内的可变状态
///
/// 锁只在同步代码中持有，不会跨越await，也不会在持锁时关闭原生连接
#[derive(Default)]
pub(crate) struct PoolState {
    pub registry: PoolRegistry,
    pub waiters: WaitQueue,
    /// 已预留名额、正在创建中的连接数，计入容量上限
    pub pending_creations: usize,
    pub closed: bool,
    pub next_connection_id: u64,
    pub counters: PoolCounters,
}

impl PoolState {
    fn has_capacity(&self, max_connections: u32) -> bool {
        self.registry.len() + self.pending_creations < max_connections as usize
    }
}

/// 归还连接的处理结果
pub(crate) enum CheckIn {
    /// 放回空闲列表
    Idle,
    /// 直接移交给了等待者
    HandedOff,
    /// 连接被丢弃，需要关闭
    Discarded(Box<dyn NativeConnection>),
    /// 连接不属于注册表（通常是连接池已关闭）
    Unknown {
        conn: Box<dyn NativeConnection>,
        pool_closed: bool,
    },
}

/// 连接池共享状态
pub(crate) struct PoolShared {
    pub(crate) config: PoolConfig,
    pub(crate) factory: Arc<dyn ConnectionFactory>,
    pub(crate) state: parking_lot::Mutex<PoolState>,
    pub(crate) sweeper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl PoolShared {
    /// 在锁内处理一个归还的连接
    pub(crate) fn check_in_locked(
        self: &Arc<Self>,
        state: &mut PoolState,
        id: ConnectionId,
        conn: Box<dyn NativeConnection>,
        usage: QueryUsage,
        discard: bool,
    ) -> CheckIn {
        if !state.registry.contains(id) {
            return CheckIn::Unknown {
                conn,
                pool_closed: state.closed,
            };
        }

        state.registry.record_usage(id, usage);
        state.counters.record_usage(usage);

        if discard {
            state.registry.remove(id);
            state.counters.total_closed += 1;
            self.grant_capacity_locked(state);
            return CheckIn::Discarded(conn);
        }

        // 按先来先服务的顺序移交给等待者，已放弃的等待者会被跳过
        let mut conn = conn;
        while let Some(waiter) = state.waiters.pop_front() {
            let now = Instant::now();
            state.registry.touch(id, now);
            let handle = PooledConnection::new(self.clone(), id, conn);
            match waiter.sender.send(Handoff::Connection(handle)) {
                Ok(()) => {
                    debug!(
                        "连接 {} 移交给等待者，等待时间 {}ms",
                        id,
                        now.saturating_duration_since(waiter.enqueued_at).as_millis()
                    );
                    return CheckIn::HandedOff;
                }
                Err(returned) => {
                    let Handoff::Connection(mut returned) = returned else {
                        return CheckIn::HandedOff;
                    };
                    let Some(native) = returned.take_native() else {
                        return CheckIn::HandedOff;
                    };
                    conn = native;
                }
            }
        }

        match state.registry.check_in(id, conn, Instant::now()) {
            Ok(()) => CheckIn::Idle,
            Err(conn) => CheckIn::Unknown {
                conn,
                pool_closed: state.closed,
            },
        }
    }

    /// 锁外完成归还的收尾工作
    pub(crate) fn finish_check_in(&self, id: ConnectionId, outcome: CheckIn) {
        match outcome {
            CheckIn::Idle | CheckIn::HandedOff => {}
            CheckIn::Discarded(conn) => {
                debug!("关闭被丢弃的连接 {}", id);
                close_detached(conn);
            }
            CheckIn::Unknown { conn, pool_closed } => {
                let message =
                    crate::i18n::tf("warn.release_unknown_handle", &[("id", &id.to_string())]);
                if pool_closed {
                    debug!("{}", message);
                } else {
                    warn!("{}", message);
                }
                close_detached(conn);
            }
        }
    }

    /// 加锁并归还连接
    pub(crate) fn release_native(
        self: &Arc<Self>,
        id: ConnectionId,
        conn: Box<dyn NativeConnection>,
        usage: QueryUsage,
        discard: bool,
    ) {
        let outcome = {
            let mut state = self.state.lock();
            self.check_in_locked(&mut state, id, conn, usage, discard)
        };
        self.finish_check_in(id, outcome);
    }

    /// 归还一个未使用的创建名额
    pub(crate) fn cancel_reservation_locked(self: &Arc<Self>, state: &mut PoolState) {
        state.pending_creations = state.pending_creations.saturating_sub(1);
        self.grant_capacity_locked(state);
    }

    /// 有空余容量时，把创建名额依次交给队首的等待者
    fn grant_capacity_locked(self: &Arc<Self>, state: &mut PoolState) {
        while state.has_capacity(self.config.max_connections) {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            state.pending_creations += 1;
            let permit = CreationPermit::reserved(self.clone());
            if let Err(returned) = waiter.sender.send(Handoff::Reserved(permit)) {
                if let Handoff::Reserved(permit) = returned {
                    permit.disarm();
                }
                state.pending_creations -= 1;
            }
        }
    }

    /// 登记新建的连接，连接池已关闭时返回None
    fn register_created(&self, permit: CreationPermit) -> Option<ConnectionId> {
        let mut state = self.state.lock();
        state.pending_creations = state.pending_creations.saturating_sub(1);
        permit.disarm();

        if state.closed {
            return None;
        }

        state.next_connection_id += 1;
        let id = ConnectionId(state.next_connection_id);
        state.registry.insert_in_use(id, Instant::now());
        state.counters.total_created += 1;
        Some(id)
    }

    /// 使用预留的名额创建一个新连接，新连接处于借出状态
    pub(crate) async fn open_connection(
        self: &Arc<Self>,
        permit: CreationPermit,
    ) -> QuickPoolResult<(ConnectionId, Box<dyn NativeConnection>)> {
        let conn = match self.factory.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                self.state.lock().counters.failed_connections += 1;
                // 名额归还后会转交给下一个等待者
                drop(permit);
                error!("创建{}连接失败: {}", self.factory.engine_name(), e);
                return Err(match e {
                    QuickPoolError::ConnectionCreationError { .. } => e,
                    other => crate::quick_error!(
                        connection_creation,
                        crate::i18n::tf(
                            "error.connection_creation",
                            &[
                                ("engine", self.factory.engine_name()),
                                ("message", &other.to_string())
                            ]
                        )
                    ),
                });
            }
        };

        match self.register_created(permit) {
            Some(id) => {
                debug!("创建新连接 {} (引擎={})", id, self.factory.engine_name());
                Ok((id, conn))
            }
            None => {
                debug!("连接创建完成时连接池已关闭，丢弃新连接");
                if let Err(e) = conn.close().await {
                    warn!("关闭连接失败: {}", e);
                }
                Err(QuickPoolError::PoolClosedError)
            }
        }
    }

    /// 创建连接直到达到最小连接数，新连接放入空闲列表（或直接移交给等待者）
    pub(crate) async fn fill_to_min(self: &Arc<Self>) -> QuickPoolResult<usize> {
        let mut created = 0;
        loop {
            let permit = {
                let mut state = self.state.lock();
                if state.closed
                    || state.registry.len() + state.pending_creations
                        >= self.config.min_connections as usize
                {
                    break;
                }
                state.pending_creations += 1;
                CreationPermit::reserved(self.clone())
            };

            let (id, conn) = self.open_connection(permit).await?;
            self.release_native(id, conn, QueryUsage::default(), false);
            created += 1;
        }
        Ok(created)
    }
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

/// 在后台关闭原生连接
pub(crate) fn close_detached(conn: Box<dyn NativeConnection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = conn.close().await {
                    warn!("关闭连接失败: {}", e);
                }
            });
        }
        Err(_) => drop(conn),
    }
}

struct QueuedWaiter<'a> {
    shared: &'a PoolShared,
    id: WaiterId,
    active: bool,
}

impl QueuedWaiter<'_> {
    /// 离开等待队列，返回离开前是否仍在队列中
    fn leave(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.shared.state.lock().waiters.remove(self.id)
    }
}

impl Drop for QueuedWaiter<'_> {
    fn drop(&mut self) {
        self.leave();
    }
}

enum AcquireStep {
    Ready(ConnectionId, Box<dyn NativeConnection>),
    Create(CreationPermit),
    Wait(WaiterId, oneshot::Receiver<Handoff>),
}

/// 通用连接池
///
/// 管理一组原生连接，按需创建（不超过 `max_connections`），
/// 饱和时按先来先服务排队等待，并在后台回收空闲超时的连接
#[derive(Clone)]
pub struct ConnectionPool {
    pub(crate) shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// 使用连接工厂创建连接池，并预建 `min_connections` 个连接
    ///
    /// # 参数
    ///
    /// * `factory` - 原生连接工厂
    /// * `config` - 连接池配置
    pub async fn new(factory: Arc<dyn ConnectionFactory>, config: PoolConfig) -> QuickPoolResult<Self> {
        config.validate()?;

        info!(
            "创建连接池: 引擎={}, 最小连接数={}, 最大连接数={}",
            factory.engine_name(),
            config.min_connections,
            config.max_connections
        );

        let pool = Self {
            shared: Arc::new(PoolShared {
                config,
                factory,
                state: parking_lot::Mutex::new(PoolState::default()),
                sweeper: parking_lot::Mutex::new(None),
            }),
        };

        if let Err(e) = pool.shared.fill_to_min().await {
            error!("预建连接失败，关闭连接池: {}", e);
            pool.close().await;
            return Err(e);
        }

        pool.start_maintenance();
        Ok(pool)
    }

    /// 根据数据库配置创建连接池
    pub async fn connect(config: &DatabaseConfig) -> QuickPoolResult<Self> {
        let factory = create_factory(&config.engine)?;
        Self::new(factory, config.pool.clone()).await
    }

    /// 连接池配置
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// 引擎名称
    pub fn engine_name(&self) -> &'static str {
        self.shared.factory.engine_name()
    }

    /// 连接池是否已关闭
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// 获取一个连接
    ///
    /// 优先复用空闲最久的连接；没有空闲连接且未达上限时创建新连接；
    /// 否则排队等待，直到有连接归还或超过 `acquire_timeout_ms`
    pub async fn acquire(&self) -> QuickPoolResult<PooledConnection> {
        let started = Instant::now();
        let deadline = self.shared.config.acquire_timeout().map(|timeout| started + timeout);

        let step = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(QuickPoolError::PoolClosedError);
            }

            let now = Instant::now();
            if let Some((id, conn)) = state.registry.checkout_idle(now) {
                AcquireStep::Ready(id, conn)
            } else if state.has_capacity(self.shared.config.max_connections) {
                state.pending_creations += 1;
                AcquireStep::Create(CreationPermit::reserved(self.shared.clone()))
            } else {
                let (waiter_id, receiver) = state.waiters.enqueue(now);
                debug!("连接池已满，进入等待队列 (队列长度={})", state.waiters.len());
                AcquireStep::Wait(waiter_id, receiver)
            }
        };

        match step {
            AcquireStep::Ready(id, conn) => {
                debug!("复用空闲连接 {}", id);
                Ok(PooledConnection::new(self.shared.clone(), id, conn))
            }
            AcquireStep::Create(permit) => self.create_checked_out(permit).await,
            AcquireStep::Wait(waiter_id, receiver) => {
                match self.wait_for_handoff(waiter_id, receiver, deadline, started).await? {
                    Handoff::Connection(conn) => Ok(conn),
                    Handoff::Reserved(permit) => self.create_checked_out(permit).await,
                    Handoff::Closed => Err(QuickPoolError::PoolClosingError),
                }
            }
        }
    }

    async fn create_checked_out(&self, permit: CreationPermit) -> QuickPoolResult<PooledConnection> {
        let (id, conn) = self.shared.open_connection(permit).await?;
        Ok(PooledConnection::new(self.shared.clone(), id, conn))
    }

    async fn wait_for_handoff(
        &self,
        waiter_id: WaiterId,
        mut receiver: oneshot::Receiver<Handoff>,
        deadline: Option<Instant>,
        started: Instant,
    ) -> QuickPoolResult<Handoff> {
        // 调用方放弃等待（future被丢弃）时也要离开队列
        let mut queued = QueuedWaiter {
            shared: &self.shared,
            id: waiter_id,
            active: true,
        };

        let Some(deadline) = deadline else {
            return receiver.await.map_err(|_| QuickPoolError::PoolClosingError);
        };

        match tokio::time::timeout_at(deadline, &mut receiver).await {
            Ok(received) => received.map_err(|_| QuickPoolError::PoolClosingError),
            Err(_) => {
                if queued.leave() {
                    let waited_ms = started.elapsed().as_millis() as u64;
                    warn!("获取连接超时: 已等待 {}ms", waited_ms);
                    return Err(QuickPoolError::AcquireTimeoutError { waited_ms });
                }
                // 超时与移交同时发生：移交已完成，结果就在通道里
                receiver.try_recv().map_err(|_| QuickPoolError::PoolClosingError)
            }
        }
    }

    /// 归还连接
    ///
    /// 等价于 `conn.release()`；连接属于其他连接池时会归还给其所属的连接池
    pub fn release(&self, conn: PooledConnection) {
        if !Arc::ptr_eq(&conn.shared, &self.shared) {
            warn!(
                "{}",
                crate::i18n::tf("warn.release_foreign_handle", &[("id", &conn.id().to_string())])
            );
        }
        conn.release();
    }

    /// 关闭连接池
    ///
    /// 拒绝所有等待者，关闭空闲连接；借出中的连接在归还时关闭。重复调用无副作用
    pub async fn close(&self) {
        let (waiters, idle, in_use) = {
            let mut state = self.shared.state.lock();
            if state.closed {
                debug!("连接池已关闭，忽略重复关闭");
                return;
            }
            state.closed = true;

            let waiters = state.waiters.drain();
            let (idle, in_use) = state.registry.drain();
            state.counters.total_closed += (idle.len() + in_use) as u64;
            (waiters, idle, in_use)
        };

        if let Some(handle) = self.shared.sweeper.lock().take() {
            handle.abort();
        }

        let rejected = waiters.len();
        for waiter in waiters {
            let _ = waiter.sender.send(Handoff::Closed);
        }

        let idle_count = idle.len();
        for conn in idle {
            if let Err(e) = conn.close().await {
                warn!("关闭连接失败: {}", e);
            }
        }

        info!(
            "连接池已关闭: 关闭空闲连接 {} 个, 借出中连接 {} 个, 拒绝等待请求 {} 个",
            idle_count, in_use, rejected
        );
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("engine", &self.engine_name())
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}
