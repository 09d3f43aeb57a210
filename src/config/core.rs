//! # 配置管理模块 - 核心配置类型
//!
//! 连接池配置、引擎配置，以及从TOML加载配置的入口

use crate::error::{QuickPoolError, QuickPoolResult};
use rat_logger::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 连接池配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 最小连接数（启动时预建，回收时不会低于此值）
    pub min_connections: u32,
    /// 最大连接数（同时存在的连接硬上限）
    pub max_connections: u32,
    /// 空闲连接超时时间（毫秒），未设置时从不回收
    pub idle_timeout_ms: Option<u64>,
    /// 获取连接超时时间（毫秒），未设置时无限等待
    pub acquire_timeout_ms: Option<u64>,
    /// 空闲回收检查间隔（毫秒）
    pub idle_check_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            idle_timeout_ms: None,
            acquire_timeout_ms: None,
            idle_check_interval_ms: 1000,
        }
    }
}

impl PoolConfig {
    /// 校验配置的合理性
    pub fn validate(&self) -> QuickPoolResult<()> {
        if self.max_connections == 0 {
            return Err(crate::quick_error!(
                config,
                crate::i18n::tf("error.config_max_zero", &[])
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(crate::quick_error!(
                config,
                crate::i18n::tf(
                    "error.config_min_exceeds_max",
                    &[
                        ("min", &self.min_connections.to_string()),
                        ("max", &self.max_connections.to_string())
                    ]
                )
            ));
        }

        let durations = [
            ("idle_timeout_ms", self.idle_timeout_ms),
            ("acquire_timeout_ms", self.acquire_timeout_ms),
            ("idle_check_interval_ms", Some(self.idle_check_interval_ms)),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, value)| *value == Some(0)) {
            return Err(crate::quick_error!(
                config,
                crate::i18n::tf("error.config_zero_duration", &[("field", *field)])
            ));
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }
}

/// 数据库引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineConfig {
    /// SQLite 文件数据库
    SQLite {
        /// 数据库文件路径
        path: String,
        /// 是否创建数据库文件（如果不存在）
        #[serde(default = "default_create_if_missing")]
        create_if_missing: bool,
    },
    /// DuckDB 嵌入式分析数据库
    DuckDB {
        /// 数据库文件路径，`:memory:` 表示内存数据库
        path: String,
    },
}

fn default_create_if_missing() -> bool {
    true
}

impl EngineConfig {
    /// 引擎名称
    pub fn engine_name(&self) -> &'static str {
        match self {
            EngineConfig::SQLite { .. } => "sqlite",
            EngineConfig::DuckDB { .. } => "duckdb",
        }
    }
}

/// 数据库配置：引擎 + 连接池
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 引擎配置
    pub engine: EngineConfig,
    /// 连接池配置
    #[serde(default)]
    pub pool: PoolConfig,
}

impl DatabaseConfig {
    /// 从TOML字符串解析配置
    ///
    /// ```toml
    /// [engine]
    /// type = "DuckDB"
    /// path = "project.duckdb"
    ///
    /// [pool]
    /// min_connections = 1
    /// max_connections = 4
    /// acquire_timeout_ms = 5000
    /// ```
    pub fn from_toml_str(content: &str) -> QuickPoolResult<Self> {
        let config: DatabaseConfig = toml::from_str(content)?;
        config.pool.validate()?;
        Ok(config)
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> QuickPoolResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(QuickPoolError::IoError)?;
        let config = Self::from_toml_str(&content)?;
        info!(
            "加载数据库配置: 文件={}, 引擎={}",
            path.display(),
            config.engine.engine_name()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config_is_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.acquire_timeout(), None);
    }

    #[test]
    fn test_zero_interval_names_the_field() {
        let config = PoolConfig {
            idle_check_interval_ms: 0,
            ..PoolConfig::default()
        };
        let expected = crate::i18n::tf(
            "error.config_zero_duration",
            &[("field", "idle_check_interval_ms")],
        );
        match config.validate() {
            Err(QuickPoolError::ConfigError { message }) => assert_eq!(message, expected),
            other => panic!("应当返回配置错误: {:?}", other),
        }
    }

    #[test]
    fn test_parse_database_config() {
        let config = DatabaseConfig::from_toml_str(
            r#"
            [engine]
            type = "SQLite"
            path = "data/project.db"

            [pool]
            min_connections = 2
            max_connections = 4
            idle_timeout_ms = 30000
            "#,
        )
        .expect("配置解析失败");

        assert_eq!(
            config.engine,
            EngineConfig::SQLite {
                path: "data/project.db".to_string(),
                create_if_missing: true,
            }
        );
        assert_eq!(config.pool.min_connections, 2);
        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.pool.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.pool.acquire_timeout_ms, None);
        assert_eq!(config.pool.idle_check_interval_ms, 1000);
    }

    #[test]
    fn test_invalid_pool_section_is_rejected() {
        let result = DatabaseConfig::from_toml_str(
            r#"
            [engine]
            type = "DuckDB"
            path = ":memory:"

            [pool]
            min_connections = 5
            max_connections = 2
            "#,
        );
        assert!(matches!(result, Err(QuickPoolError::ConfigError { .. })));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = DatabaseConfig::from_toml_str("[engine\ntype = ");
        assert!(matches!(result, Err(QuickPoolError::ConfigError { .. })));
    }
}
