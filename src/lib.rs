//! rat_quickpool - 嵌入式数据库连接池
//!
//! 为SQLite、DuckDB等嵌入式数据库提供通用的连接池和事务协调器：
//! 按需创建连接并限制上限、饱和时先来先服务排队等待、后台回收空闲连接，
//! 以及保证提交/回滚与连接归还的事务执行

// 导出所有公共模块
pub mod adapter;
pub mod config;
pub mod error;
pub mod i18n;
pub mod pool;
pub mod transaction;
pub mod types;

// 重新导出常用类型和函数
pub use adapter::{ConnectionFactory, NativeConnection, create_factory};
pub use config::{DatabaseConfig, DatabaseConfigBuilder, EngineConfig, PoolConfig, PoolConfigBuilder};
pub use error::{QuickPoolError, QuickPoolResult};
pub use pool::{ConnectionId, ConnectionInfo, ConnectionPool, ConnectionState, PoolStats, PooledConnection};
pub use transaction::TransactionCoordinator;
pub use types::{DataValue, Row};

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 初始化rat_quickpool库
///
/// 注册多语言错误消息；日志系统由调用者自行初始化
pub fn init() {
    i18n::ErrorMessageI18n::init();
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
