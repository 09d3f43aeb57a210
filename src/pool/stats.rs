//! 连接池统计信息

use super::pool::ConnectionPool;
use super::types::{ConnectionInfo, QueryUsage, average_ms};
use crate::error::QuickPoolResult;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// 累计计数器
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub total_created: u64,
    pub total_closed: u64,
    pub failed_connections: u64,
    pub total_queries: u64,
    pub total_query_time: Duration,
}

impl PoolCounters {
    pub fn record_usage(&mut self, usage: QueryUsage) {
        self.total_queries += usage.count;
        self.total_query_time += usage.elapsed;
    }
}

/// 连接池统计快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    /// 注册表中的连接总数（空闲 + 借出）
    pub total: usize,
    /// 借出中的连接数
    pub active: usize,
    /// 空闲连接数
    pub idle: usize,
    /// 等待队列长度
    pub waiting: usize,
    /// 正在创建中的连接数
    pub pending: usize,
    /// 连接创建失败次数
    pub failed_connections: u64,
    pub total_created: u64,
    pub total_closed: u64,
    /// 已归还连接上执行过的语句总数
    pub total_queries: u64,
    pub avg_query_time_ms: f64,
    pub closed: bool,
}

impl ConnectionPool {
    /// 获取连接池统计信息
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        let idle = state.registry.idle_count();
        PoolStats {
            total: state.registry.len(),
            active: state.registry.in_use_count(),
            idle,
            waiting: state.waiters.len(),
            pending: state.pending_creations,
            failed_connections: state.counters.failed_connections,
            total_created: state.counters.total_created,
            total_closed: state.counters.total_closed,
            total_queries: state.counters.total_queries,
            avg_query_time_ms: average_ms(QueryUsage {
                count: state.counters.total_queries,
                elapsed: state.counters.total_query_time,
            }),
            closed: state.closed,
        }
    }

    /// 获取每个连接的状态快照，按连接ID排序
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.shared.state.lock().registry.infos(Instant::now())
    }

    /// 以JSON格式导出连接池状态
    pub fn status_json(&self) -> QuickPoolResult<String> {
        let status = serde_json::json!({
            "engine": self.engine_name(),
            "config": self.config(),
            "stats": self.stats(),
            "connections": self.connections(),
        });
        Ok(serde_json::to_string_pretty(&status)?)
    }
}
