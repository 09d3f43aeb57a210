//! 连接池模块
//!
//! 通用的嵌入式数据库连接池：按需创建连接、饱和时先来先服务排队、
//! 后台回收空闲连接，并提供基于连接池的查询便捷操作

// 导入所有子模块
pub mod connection;
mod maintenance;
mod operations;
pub mod pool;
mod registry;
pub mod stats;
pub mod types;
mod wait_queue;

// 重新导出主要的公共类型和结构体
pub use connection::PooledConnection;
pub use pool::ConnectionPool;
pub use stats::PoolStats;
pub use types::{ConnectionId, ConnectionInfo, ConnectionState};
