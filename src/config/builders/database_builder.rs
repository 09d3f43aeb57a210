//! # 数据库配置构建器模块
//!
//! 提供数据库配置的构建器实现，支持链式调用和严格验证

use crate::config::core::{DatabaseConfig, EngineConfig, PoolConfig};
use crate::error::QuickPoolError;
use rat_logger::info;

/// 数据库配置构建器
///
/// 引擎和连接池配置都必须显式设置
#[derive(Debug)]
pub struct DatabaseConfigBuilder {
    engine: Option<EngineConfig>,
    pool: Option<PoolConfig>,
}

impl DatabaseConfig {
    /// 创建数据库配置构建器
    pub fn builder() -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new()
    }
}

impl DatabaseConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            engine: None,
            pool: None,
        }
    }

    /// 设置引擎配置
    ///
    /// # 参数
    ///
    /// * `engine` - 引擎配置
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = Some(engine);
        self
    }

    /// 设置连接池配置
    ///
    /// # 参数
    ///
    /// * `pool` - 连接池配置
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    /// 构建数据库配置
    pub fn build(self) -> Result<DatabaseConfig, QuickPoolError> {
        let engine = self
            .engine
            .ok_or_else(|| crate::quick_error!(config, "数据库引擎配置必须设置"))?;

        let pool = self
            .pool
            .ok_or_else(|| crate::quick_error!(config, "连接池配置必须设置"))?;

        pool.validate()?;

        let (EngineConfig::SQLite { path, .. } | EngineConfig::DuckDB { path }) = &engine;
        if path.trim().is_empty() {
            return Err(crate::quick_error!(config, "数据库路径不能为空"));
        }

        info!("创建数据库配置: 引擎={}", engine.engine_name());

        Ok(DatabaseConfig { engine, pool })
    }
}

impl Default for DatabaseConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
