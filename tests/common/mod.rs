//! 测试用的模拟数据库引擎
//!
//! 记录每个连接执行过的语句，并可以按需让连接创建或特定语句失败

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rat_quickpool::{
    ConnectionFactory, ConnectionPool, DataValue, NativeConnection, PoolConfig, QuickPoolError,
    QuickPoolResult, Row,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 模拟引擎的共享状态
#[derive(Default)]
pub struct MockEngine {
    connects: AtomicUsize,
    closes: AtomicUsize,
    fail_connect: AtomicBool,
    failing_statements: Mutex<Vec<String>>,
    breaking_statements: Mutex<Vec<String>>,
    statements: Mutex<Vec<(usize, String)>>,
}

impl MockEngine {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// 让以 `prefix` 开头的语句执行失败
    pub fn fail_statement(&self, prefix: &str) {
        self.failing_statements.lock().push(prefix.to_string());
    }

    /// 让以 `prefix` 开头的语句报告连接不可用
    pub fn break_on_statement(&self, prefix: &str) {
        self.breaking_statements.lock().push(prefix.to_string());
    }

    /// 所有执行过的语句
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().iter().map(|(_, sql)| sql.clone()).collect()
    }

    /// 指定连接执行过的语句
    pub fn statements_on(&self, conn: usize) -> Vec<String> {
        self.statements
            .lock()
            .iter()
            .filter(|(id, _)| *id == conn)
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    fn run(&self, conn: usize, sql: &str) -> QuickPoolResult<()> {
        self.statements.lock().push((conn, sql.to_string()));
        let broken = self
            .breaking_statements
            .lock()
            .iter()
            .any(|prefix| sql.starts_with(prefix.as_str()));
        if broken {
            return Err(QuickPoolError::ConnectionError {
                message: format!("mock connection lost: {}", sql),
            });
        }
        let failing = self
            .failing_statements
            .lock()
            .iter()
            .any(|prefix| sql.starts_with(prefix.as_str()));
        if failing {
            return Err(QuickPoolError::QueryError {
                message: format!("mock failure: {}", sql),
            });
        }
        Ok(())
    }
}

pub struct MockFactory {
    engine: Arc<MockEngine>,
}

impl MockFactory {
    pub fn new(engine: Arc<MockEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    fn engine_name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self) -> QuickPoolResult<Box<dyn NativeConnection>> {
        if self.engine.fail_connect.load(Ordering::SeqCst) {
            return Err(QuickPoolError::ConnectionError {
                message: "mock engine refused the connection".to_string(),
            });
        }
        let serial = self.engine.connects.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockConnection {
            serial,
            engine: self.engine.clone(),
        }))
    }
}

pub struct MockConnection {
    serial: usize,
    engine: Arc<MockEngine>,
}

#[async_trait]
impl NativeConnection for MockConnection {
    fn engine_name(&self) -> &'static str {
        "mock"
    }

    async fn query(&mut self, sql: &str, _params: &[DataValue]) -> QuickPoolResult<Vec<Row>> {
        self.engine.run(self.serial, sql)?;
        if sql.starts_with("SELECT 1") {
            let mut row = HashMap::new();
            row.insert("ok".to_string(), DataValue::Int(1));
            return Ok(vec![row]);
        }
        Ok(Vec::new())
    }

    async fn execute(&mut self, sql: &str, _params: &[DataValue]) -> QuickPoolResult<u64> {
        self.engine.run(self.serial, sql)?;
        Ok(1)
    }

    async fn close(self: Box<Self>) -> QuickPoolResult<()> {
        self.engine.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 构建连接池配置
pub fn pool_config(min: u32, max: u32) -> rat_quickpool::PoolConfigBuilder {
    PoolConfig::builder().min_connections(min).max_connections(max)
}

/// 创建使用模拟引擎的连接池
pub async fn mock_pool(config: PoolConfig) -> (ConnectionPool, Arc<MockEngine>) {
    let engine = Arc::new(MockEngine::default());
    let pool = ConnectionPool::new(Arc::new(MockFactory::new(engine.clone())), config)
        .await
        .expect("创建连接池失败");
    (pool, engine)
}

/// 让出执行权直到等待队列达到指定长度
pub async fn wait_for_waiters(pool: &ConnectionPool, count: usize) {
    for _ in 0..1000 {
        if pool.stats().waiting == count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("等待队列长度没有达到 {}", count);
}

/// 让后台任务（异步关闭连接等）有机会执行
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// 检查连接数不变式
pub fn assert_invariant(pool: &ConnectionPool) {
    let stats = pool.stats();
    assert_eq!(
        (stats.active + stats.idle) as u64,
        stats.total_created - stats.total_closed,
        "active + idle 必须等于 created - closed: {:?}",
        stats
    );
    assert!(stats.active + stats.idle <= pool.config().max_connections as usize);
}
