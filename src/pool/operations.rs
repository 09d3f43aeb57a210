//! 连接池便捷操作
//!
//! 每个操作独立获取一个连接，执行完毕后立即归还

use super::pool::ConnectionPool;
use crate::error::QuickPoolResult;
use crate::types::{DataValue, Row};
use rat_logger::error;

impl ConnectionPool {
    /// 执行查询语句并返回所有行
    ///
    /// # 参数
    ///
    /// * `sql` - SQL语句
    /// * `params` - 语句参数
    pub async fn query(&self, sql: &str, params: &[DataValue]) -> QuickPoolResult<Vec<Row>> {
        let mut conn = self.acquire().await?;
        let result = conn.query(sql, params).await;
        conn.release();
        result
    }

    /// 执行查询语句并返回第一行
    pub async fn query_one(&self, sql: &str, params: &[DataValue]) -> QuickPoolResult<Option<Row>> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    /// 执行无结果集的语句，返回受影响行数
    ///
    /// # 参数
    ///
    /// * `sql` - SQL语句
    /// * `params` - 语句参数
    pub async fn execute(&self, sql: &str, params: &[DataValue]) -> QuickPoolResult<u64> {
        let mut conn = self.acquire().await?;
        let result = conn.execute(sql, params).await;
        conn.release();
        result
    }

    /// 健康检查
    ///
    /// 执行 `SELECT 1`，任何错误都记录日志并返回false，不会向调用方抛出
    pub async fn health_check(&self) -> bool {
        match self.query_one("SELECT 1 AS ok", &[]).await {
            Ok(Some(row)) => {
                let healthy = row.get("ok").and_then(DataValue::as_i64) == Some(1);
                if !healthy {
                    error!("健康检查返回了意外的结果: {:?}", row);
                }
                healthy
            }
            Ok(None) => {
                error!("健康检查没有返回任何行");
                false
            }
            Err(e) => {
                error!("健康检查失败 (引擎={}): {}", self.engine_name(), e);
                false
            }
        }
    }
}
