//! 错误处理模块
//!
//! 定义连接池、事务协调器和数据库引擎的统一错误类型

use thiserror::Error;

/// 连接池错误类型
#[derive(Error, Debug)]
pub enum QuickPoolError {
    /// 创建新连接失败（引擎级故障，不自动重试）
    #[error("连接创建失败: {message}")]
    ConnectionCreationError { message: String },

    /// 在截止时间前没有可用连接
    #[error("获取连接超时: 已等待 {waited_ms}ms")]
    AcquireTimeoutError { waited_ms: u64 },

    /// 连接池已关闭
    #[error("连接池已关闭")]
    PoolClosedError,

    /// 等待期间连接池正在关闭
    #[error("连接池正在关闭，等待请求已被拒绝")]
    PoolClosingError,

    /// 提交事务失败，事务状态不确定
    #[error("事务提交失败: {message}")]
    CommitError { message: String },

    /// 回滚事务失败
    #[error("事务回滚失败: {message}")]
    RollbackError { message: String },

    /// 事务状态错误（例如在同一连接上嵌套开启事务）
    #[error("事务错误: {message}")]
    TransactionError { message: String },

    /// 语句执行失败
    #[error("查询执行失败: {message}")]
    QueryError { message: String },

    /// 底层连接不可用
    #[error("数据库连接错误: {message}")]
    ConnectionError { message: String },

    /// 配置错误
    #[error("配置错误: {message}")]
    ConfigError { message: String },

    /// 序列化错误
    #[error("数据序列化失败: {message}")]
    SerializationError { message: String },

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),
}

/// 连接池结果类型
pub type QuickPoolResult<T> = Result<T, QuickPoolError>;

impl QuickPoolError {
    /// 调用方是否可以直接重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuickPoolError::AcquireTimeoutError { .. })
    }

    /// 是否由连接池关闭导致
    pub fn is_pool_closed(&self) -> bool {
        matches!(
            self,
            QuickPoolError::PoolClosedError | QuickPoolError::PoolClosingError
        )
    }
}

impl From<serde_json::Error> for QuickPoolError {
    fn from(err: serde_json::Error) -> Self {
        QuickPoolError::SerializationError {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for QuickPoolError {
    fn from(err: toml::de::Error) -> Self {
        QuickPoolError::ConfigError {
            message: crate::i18n::tf("error.config_parse", &[("message", &err.to_string())]),
        }
    }
}

/// 快速构造错误的宏
///
/// ```ignore
/// return Err(quick_error!(config, "最小连接数不能大于最大连接数"));
/// ```
#[macro_export]
macro_rules! quick_error {
    (connection_creation, $msg:expr) => {
        $crate::error::QuickPoolError::ConnectionCreationError {
            message: $msg.to_string(),
        }
    };
    (commit, $msg:expr) => {
        $crate::error::QuickPoolError::CommitError {
            message: $msg.to_string(),
        }
    };
    (rollback, $msg:expr) => {
        $crate::error::QuickPoolError::RollbackError {
            message: $msg.to_string(),
        }
    };
    (transaction, $msg:expr) => {
        $crate::error::QuickPoolError::TransactionError {
            message: $msg.to_string(),
        }
    };
    (query, $msg:expr) => {
        $crate::error::QuickPoolError::QueryError {
            message: $msg.to_string(),
        }
    };
    (connection, $msg:expr) => {
        $crate::error::QuickPoolError::ConnectionError {
            message: $msg.to_string(),
        }
    };
    (config, $msg:expr) => {
        $crate::error::QuickPoolError::ConfigError {
            message: $msg.to_string(),
        }
    };
    (serialization, $msg:expr) => {
        $crate::error::QuickPoolError::SerializationError {
            message: $msg.to_string(),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_error_builds_variants() {
        let err = crate::quick_error!(config, "最小连接数不能大于最大连接数");
        assert!(matches!(err, QuickPoolError::ConfigError { .. }));
        assert_eq!(err.to_string(), "配置错误: 最小连接数不能大于最大连接数");

        let err = crate::quick_error!(commit, "disk full");
        assert!(matches!(err, QuickPoolError::CommitError { ref message } if message == "disk full"));
    }

    #[test]
    fn test_error_classification() {
        assert!(QuickPoolError::AcquireTimeoutError { waited_ms: 50 }.is_retryable());
        assert!(!QuickPoolError::PoolClosedError.is_retryable());
        assert!(QuickPoolError::PoolClosingError.is_pool_closed());
        assert!(!crate::quick_error!(query, "boom").is_pool_closed());
    }
}
