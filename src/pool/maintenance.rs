//! 连接池后台维护
//!
//! 定期回收空闲超时的连接（不低于最小连接数），并把连接数补足到最小连接数

use super::pool::{ConnectionPool, PoolShared};
use rat_logger::{debug, info, warn};
use std::sync::{Arc, Weak};
use tokio::time::{Instant, MissedTickBehavior, interval};

impl ConnectionPool {
    /// 启动后台维护任务
    ///
    /// 任务只持有弱引用，所有连接池句柄被丢弃后自动退出
    pub(crate) fn start_maintenance(&self) {
        let config = &self.shared.config;
        if config.idle_timeout().is_none() && config.min_connections == 0 {
            debug!("未配置空闲超时且最小连接数为0，不启动维护任务");
            return;
        }

        let period = config.idle_check_interval();
        let weak: Weak<PoolShared> = Arc::downgrade(&self.shared);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次tick立即完成，跳过
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !shared.run_maintenance().await {
                    break;
                }
            }
            debug!("连接池维护任务退出");
        });

        *self.shared.sweeper.lock() = Some(handle);
    }

    /// 立即执行一次空闲回收，返回回收的连接数
    pub async fn sweep_idle(&self) -> usize {
        self.shared.sweep_idle().await
    }
}

impl PoolShared {
    /// 执行一轮维护，连接池已关闭时返回false
    async fn run_maintenance(self: &Arc<Self>) -> bool {
        if self.state.lock().closed {
            return false;
        }

        self.sweep_idle().await;

        if let Err(e) = self.fill_to_min().await {
            warn!("补充最小连接数失败: {}", e);
        }
        true
    }

    async fn sweep_idle(&self) -> usize {
        let Some(idle_timeout) = self.config.idle_timeout() else {
            return 0;
        };

        let evicted = {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }
            let floor = self.config.min_connections as usize;
            let budget = state.registry.len().saturating_sub(floor);
            if budget == 0 {
                return 0;
            }
            let evicted = state.registry.evict_idle(Instant::now(), idle_timeout, budget);
            state.counters.total_closed += evicted.len() as u64;
            evicted
        };

        let count = evicted.len();
        for conn in evicted {
            if let Err(e) = conn.close().await {
                warn!("关闭空闲连接失败: {}", e);
            }
        }

        if count > 0 {
            info!("回收空闲连接 {} 个", count);
        }
        count
    }
}
