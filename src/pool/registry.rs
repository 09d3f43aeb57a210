//! 连接注册表
//!
//! 记录连接池拥有的每一个连接（空闲或借出），容量计算以此为准

use crate::adapter::NativeConnection;
use crate::pool::types::{ConnectionId, ConnectionInfo, ConnectionSlot, ConnectionState, QueryUsage};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
pub(crate) struct PoolRegistry {
    slots: HashMap<ConnectionId, ConnectionSlot>,
}

impl PoolRegistry {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn idle_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.state == ConnectionState::Idle)
            .count()
    }

    pub fn in_use_count(&self) -> usize {
        self.slots.len() - self.idle_count()
    }

    /// 登记一个新建的连接，初始状态为借出
    pub fn insert_in_use(&mut self, id: ConnectionId, now: Instant) {
        self.slots.insert(id, ConnectionSlot::new(id, now));
    }

    /// 取出空闲最久的连接并标记为借出
    pub fn checkout_idle(&mut self, now: Instant) -> Option<(ConnectionId, Box<dyn NativeConnection>)> {
        let slot = self
            .slots
            .values_mut()
            .filter(|slot| slot.state == ConnectionState::Idle)
            .min_by_key(|slot| slot.last_used_at)?;

        let connection = slot.connection.take()?;
        slot.state = ConnectionState::InUse;
        slot.last_used_at = now;
        Some((slot.id, connection))
    }

    /// 借出的连接直接移交给下一个调用方
    pub fn touch(&mut self, id: ConnectionId, now: Instant) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.last_used_at = now;
        }
    }

    pub fn record_usage(&mut self, id: ConnectionId, usage: QueryUsage) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.usage.count += usage.count;
            slot.usage.elapsed += usage.elapsed;
        }
    }

    /// 将借出的连接放回空闲状态
    ///
    /// id未登记时原样返回连接
    pub fn check_in(
        &mut self,
        id: ConnectionId,
        connection: Box<dyn NativeConnection>,
        now: Instant,
    ) -> Result<(), Box<dyn NativeConnection>> {
        match self.slots.get_mut(&id) {
            Some(slot) => {
                slot.state = ConnectionState::Idle;
                slot.last_used_at = now;
                slot.connection = Some(connection);
                Ok(())
            }
            None => Err(connection),
        }
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionSlot> {
        self.slots.remove(&id)
    }

    /// 回收空闲超时的连接，最多回收 `budget` 个，优先回收空闲最久的
    pub fn evict_idle(
        &mut self,
        now: Instant,
        idle_timeout: Duration,
        budget: usize,
    ) -> Vec<Box<dyn NativeConnection>> {
        let mut expired: Vec<(Instant, ConnectionId)> = self
            .slots
            .values()
            .filter(|slot| {
                slot.state == ConnectionState::Idle
                    && now.saturating_duration_since(slot.last_used_at) > idle_timeout
            })
            .map(|slot| (slot.last_used_at, slot.id))
            .collect();
        expired.sort();

        expired
            .into_iter()
            .take(budget)
            .filter_map(|(_, id)| self.slots.remove(&id))
            .filter_map(|slot| slot.connection)
            .collect()
    }

    /// 清空注册表，返回空闲连接和借出中的连接数量
    pub fn drain(&mut self) -> (Vec<Box<dyn NativeConnection>>, usize) {
        let mut idle = Vec::new();
        let mut in_use = 0;
        for (_, slot) in self.slots.drain() {
            match slot.connection {
                Some(connection) => idle.push(connection),
                None => in_use += 1,
            }
        }
        (idle, in_use)
    }

    pub fn infos(&self, now: Instant) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self
            .slots
            .values()
            .map(|slot| ConnectionInfo::from_slot(slot, now))
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }
}
