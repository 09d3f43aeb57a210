//! 等待队列
//!
//! 连接池饱和时，获取请求按到达顺序排队，归还的连接总是交给队首

use crate::pool::types::Handoff;
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaiterId(u64);

pub(crate) struct Waiter {
    pub id: WaiterId,
    pub enqueued_at: Instant,
    pub sender: oneshot::Sender<Handoff>,
}

#[derive(Default)]
pub(crate) struct WaitQueue {
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

impl WaitQueue {
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// 加入队尾
    pub fn enqueue(&mut self, now: Instant) -> (WaiterId, oneshot::Receiver<Handoff>) {
        let (sender, receiver) = oneshot::channel();
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        self.waiters.push_back(Waiter {
            id,
            enqueued_at: now,
            sender,
        });
        (id, receiver)
    }

    pub fn pop_front(&mut self) -> Option<Waiter> {
        self.waiters.pop_front()
    }

    /// 移除指定等待者，返回是否仍在队列中
    pub fn remove(&mut self, id: WaiterId) -> bool {
        match self.waiters.iter().position(|waiter| waiter.id == id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn drain(&mut self) -> Vec<Waiter> {
        self.waiters.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = WaitQueue::default();
        let now = Instant::now();
        let (first, _rx1) = queue.enqueue(now);
        let (second, _rx2) = queue.enqueue(now);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front().map(|w| w.id), Some(first));
        assert_eq!(queue.pop_front().map(|w| w.id), Some(second));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_remove_only_once() {
        let mut queue = WaitQueue::default();
        let now = Instant::now();
        let (first, _rx1) = queue.enqueue(now);
        let (second, _rx2) = queue.enqueue(now);

        assert!(queue.remove(first));
        assert!(!queue.remove(first));
        assert_eq!(queue.pop_front().map(|w| w.id), Some(second));
    }

    #[test]
    fn test_drain_closes_queue() {
        let mut queue = WaitQueue::default();
        let now = Instant::now();
        let (_, mut rx) = queue.enqueue(now);

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(queue.len(), 0);

        drop(drained);
        assert!(rx.try_recv().is_err());
    }
}
