//! 事务协调器测试（模拟引擎）

mod common;

use common::{mock_pool, pool_config, settle, wait_for_waiters};
use rat_quickpool::{QuickPoolError, TransactionCoordinator};
use std::fmt;

/// 业务层错误类型
#[derive(Debug)]
enum AppError {
    Boom(String),
    Pool(QuickPoolError),
}

impl From<QuickPoolError> for AppError {
    fn from(err: QuickPoolError) -> Self {
        AppError::Pool(err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Boom(message) => write!(f, "{}", message),
            AppError::Pool(err) => write!(f, "{}", err),
        }
    }
}

#[tokio::test]
async fn test_successful_work_is_committed() {
    let (pool, engine) = mock_pool(pool_config(1, 1).build().expect("配置无效")).await;
    let coordinator = TransactionCoordinator::new(pool.clone());

    let value = coordinator
        .transaction(|conn| {
            Box::pin(async move {
                conn.execute("INSERT INTO orders VALUES (?)", &[42.into()]).await?;
                Ok::<_, QuickPoolError>(42)
            })
        })
        .await
        .expect("事务失败");

    assert_eq!(value, 42);
    assert_eq!(
        engine.statements(),
        vec!["BEGIN TRANSACTION", "INSERT INTO orders VALUES (?)", "COMMIT"]
    );

    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn test_failed_work_is_rolled_back_and_error_surfaces() {
    let (pool, engine) = mock_pool(pool_config(1, 1).build().expect("配置无效")).await;

    let err = pool
        .transaction(|conn| {
            Box::pin(async move {
                conn.execute("UPDATE accounts SET balance = 0", &[]).await?;
                Err::<(), _>(AppError::Boom("boom".to_string()))
            })
        })
        .await
        .expect_err("事务应当失败");

    assert_eq!(err.to_string(), "boom");
    assert!(matches!(err, AppError::Boom(_)));

    let statements = engine.statements();
    assert_eq!(statements.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!statements.iter().any(|sql| sql == "COMMIT"));

    // 连接已归还并可复用
    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(engine.connects(), 1);
}

#[tokio::test]
async fn test_rollback_failure_keeps_original_error_and_discards_handle() {
    let (pool, engine) = mock_pool(pool_config(0, 1).build().expect("配置无效")).await;
    engine.fail_statement("ROLLBACK");

    let err = pool
        .transaction(|_conn| {
            Box::pin(async move { Err::<(), _>(AppError::Boom("boom".to_string())) })
        })
        .await
        .expect_err("事务应当失败");
    assert_eq!(err.to_string(), "boom");

    settle().await;
    let stats = pool.stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.total_closed, 1);
    assert_eq!(engine.closes(), 1);
}

#[tokio::test]
async fn test_commit_failure_is_commit_error() {
    let (pool, engine) = mock_pool(pool_config(0, 1).build().expect("配置无效")).await;
    engine.fail_statement("COMMIT");

    let err = pool
        .transaction(|conn| {
            Box::pin(async move {
                conn.execute("DELETE FROM sessions", &[]).await?;
                Ok::<_, QuickPoolError>(())
            })
        })
        .await
        .expect_err("提交应当失败");
    assert!(matches!(err, QuickPoolError::CommitError { .. }));

    // 提交状态不确定的连接不会回到池中
    settle().await;
    assert_eq!(pool.stats().total, 0);
    assert_eq!(engine.closes(), 1);
}

#[tokio::test]
async fn test_begin_failure_releases_handle() {
    let (pool, engine) = mock_pool(pool_config(1, 1).build().expect("配置无效")).await;
    engine.fail_statement("BEGIN");

    let mut ran = false;
    let err = pool
        .transaction(|_conn| {
            ran = true;
            Box::pin(async move { Ok::<_, QuickPoolError>(()) })
        })
        .await
        .expect_err("开启事务应当失败");

    assert!(matches!(err, QuickPoolError::QueryError { .. }));
    assert!(!ran);
    assert_eq!(pool.stats().idle, 1);
    assert_eq!(engine.statements(), vec!["BEGIN TRANSACTION"]);
}

#[tokio::test]
async fn test_nested_begin_is_rejected() {
    let (pool, _engine) = mock_pool(pool_config(1, 1).build().expect("配置无效")).await;

    let err = pool
        .transaction(|conn| Box::pin(async move { conn.begin().await }))
        .await
        .expect_err("嵌套事务应当失败");
    assert!(matches!(err, QuickPoolError::TransactionError { .. }));
    assert_eq!(pool.stats().idle, 1);
}

#[tokio::test]
async fn test_failed_transaction_hands_handle_to_waiter() {
    let (pool, _engine) = mock_pool(pool_config(1, 1).build().expect("配置无效")).await;
    let (proceed_tx, proceed_rx) = tokio::sync::oneshot::channel::<()>();

    let tx_pool = pool.clone();
    let transaction = tokio::spawn(async move {
        tx_pool
            .transaction(move |conn| {
                Box::pin(async move {
                    let id = conn.id();
                    let _ = proceed_rx.await;
                    Err::<(), _>(AppError::Boom(format!("boom on {}", id)))
                })
            })
            .await
    });

    // 等待事务占用唯一的连接，再让另一个调用方排队
    while pool.stats().active == 0 {
        tokio::task::yield_now().await;
    }
    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move { waiter_pool.acquire().await });
    wait_for_waiters(&pool, 1).await;

    let _ = proceed_tx.send(());
    let err = transaction
        .await
        .expect("任务失败")
        .expect_err("事务应当失败");
    assert!(err.to_string().starts_with("boom"));

    let conn = waiter.await.expect("任务失败").expect("等待者应当拿到连接");
    assert!(!conn.in_transaction());
    assert_eq!(pool.stats().active, 1);
}
