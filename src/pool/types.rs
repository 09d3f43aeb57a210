//! 连接池内部类型定义

use crate::adapter::NativeConnection;
use crate::pool::connection::{CreationPermit, PooledConnection};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// 连接ID，在同一个连接池内唯一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// 空闲，可以被获取
    Idle,
    /// 已被调用方借出
    InUse,
}

/// 单次借出期间的使用统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct QueryUsage {
    pub count: u64,
    pub elapsed: Duration,
}

impl QueryUsage {
    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.elapsed += elapsed;
    }
}

/// 连接注册表中的一项
pub(crate) struct ConnectionSlot {
    pub id: ConnectionId,
    pub state: ConnectionState,
    pub created_at: Instant,
    pub created_at_utc: DateTime<Utc>,
    pub last_used_at: Instant,
    pub usage: QueryUsage,
    /// 仅在空闲状态下持有原生连接；借出时连接在调用方手里
    pub connection: Option<Box<dyn NativeConnection>>,
}

impl ConnectionSlot {
    pub fn new(id: ConnectionId, now: Instant) -> Self {
        Self {
            id,
            state: ConnectionState::InUse,
            created_at: now,
            created_at_utc: Utc::now(),
            last_used_at: now,
            usage: QueryUsage::default(),
            connection: None,
        }
    }
}

/// 交给等待者的结果
pub(crate) enum Handoff {
    /// 直接移交一个归还的连接
    Connection(PooledConnection),
    /// 为等待者预留了一个创建名额，由等待者自己创建连接
    Reserved(CreationPermit),
    /// 连接池在等待期间被关闭
    Closed,
}

/// 单个连接的状态快照
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub state: ConnectionState,
    pub created_at: DateTime<Utc>,
    /// 连接存活时间（毫秒）
    pub age_ms: u64,
    /// 距离上次借出或归还的时间（毫秒）
    pub idle_ms: u64,
    pub query_count: u64,
    pub avg_query_time_ms: f64,
}

impl ConnectionInfo {
    pub(crate) fn from_slot(slot: &ConnectionSlot, now: Instant) -> Self {
        Self {
            id: slot.id,
            state: slot.state,
            created_at: slot.created_at_utc,
            age_ms: now.saturating_duration_since(slot.created_at).as_millis() as u64,
            idle_ms: now.saturating_duration_since(slot.last_used_at).as_millis() as u64,
            query_count: slot.usage.count,
            avg_query_time_ms: average_ms(slot.usage),
        }
    }
}

/// 计算平均查询耗时（毫秒）
pub(crate) fn average_ms(usage: QueryUsage) -> f64 {
    if usage.count == 0 {
        0.0
    } else {
        usage.elapsed.as_secs_f64() * 1000.0 / usage.count as f64
    }
}
