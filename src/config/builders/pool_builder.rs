//! # 连接池配置构建器模块
//!
//! 提供连接池配置的构建器实现，支持链式调用和严格验证

use crate::config::core::PoolConfig;
use crate::error::QuickPoolError;
use rat_logger::info;

/// 连接池配置构建器
///
/// 最小/最大连接数必须显式设置；两个超时为可选项，不设置即表示不启用
#[derive(Debug)]
pub struct PoolConfigBuilder {
    min_connections: Option<u32>,
    max_connections: Option<u32>,
    idle_timeout_ms: Option<u64>,
    acquire_timeout_ms: Option<u64>,
    idle_check_interval_ms: Option<u64>,
}

impl PoolConfig {
    /// 创建连接池配置构建器
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }
}

impl PoolConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            min_connections: None,
            max_connections: None,
            idle_timeout_ms: None,
            acquire_timeout_ms: None,
            idle_check_interval_ms: None,
        }
    }

    /// 设置最小连接数
    ///
    /// # 参数
    ///
    /// * `min_connections` - 最小连接数
    pub fn min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = Some(min_connections);
        self
    }

    /// 设置最大连接数
    ///
    /// # 参数
    ///
    /// * `max_connections` - 最大连接数
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = Some(max_connections);
        self
    }

    /// 设置空闲连接超时时间（毫秒）
    ///
    /// # 参数
    ///
    /// * `timeout_ms` - 空闲超过该时间的连接会被回收
    pub fn idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = Some(timeout_ms);
        self
    }

    /// 设置获取连接超时时间（毫秒）
    ///
    /// # 参数
    ///
    /// * `timeout_ms` - 连接池饱和时的最长等待时间
    pub fn acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = Some(timeout_ms);
        self
    }

    /// 设置空闲回收检查间隔（毫秒），默认1000
    pub fn idle_check_interval_ms(mut self, interval_ms: u64) -> Self {
        self.idle_check_interval_ms = Some(interval_ms);
        self
    }

    /// 构建连接池配置
    ///
    /// # 错误
    ///
    /// 最小/最大连接数未设置，或配置不合理时返回 `ConfigError`
    pub fn build(self) -> Result<PoolConfig, QuickPoolError> {
        let min_connections = self
            .min_connections
            .ok_or_else(|| {
                crate::quick_error!(
                    config,
                    crate::i18n::tf("error.config_missing_field", &[("field", "min_connections")])
                )
            })?;

        let max_connections = self
            .max_connections
            .ok_or_else(|| {
                crate::quick_error!(
                    config,
                    crate::i18n::tf("error.config_missing_field", &[("field", "max_connections")])
                )
            })?;

        let config = PoolConfig {
            min_connections,
            max_connections,
            idle_timeout_ms: self.idle_timeout_ms,
            acquire_timeout_ms: self.acquire_timeout_ms,
            idle_check_interval_ms: self
                .idle_check_interval_ms
                .unwrap_or(PoolConfig::default().idle_check_interval_ms),
        };

        // 验证配置的合理性
        config.validate()?;

        info!(
            "创建连接池配置: 最小连接数={}, 最大连接数={}, 空闲超时={:?}ms, 获取超时={:?}ms",
            min_connections, max_connections, config.idle_timeout_ms, config.acquire_timeout_ms
        );

        Ok(config)
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
