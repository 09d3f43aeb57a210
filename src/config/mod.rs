//! # 配置管理模块
//!
//! 提供连接池与数据库引擎的配置类型，支持构建器模式和TOML加载

pub mod builders;
pub mod core;

pub use builders::{DatabaseConfigBuilder, PoolConfigBuilder};
pub use self::core::{DatabaseConfig, EngineConfig, PoolConfig};
