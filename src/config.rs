//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求合并组的配置结构和解析逻辑。

use crate::error::{FlightError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 注册表预分配容量上限
pub const MAX_INITIAL_CAPACITY: usize = 1 << 20;
/// 加载超时上限（毫秒），一小时
pub const MAX_LOAD_TIMEOUT_MS: u64 = 3_600_000;

/// 组配置
///
/// 所有字段都有默认值，TOML 中可以只写需要覆盖的字段
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GroupConfig {
    /// 组名称，用于日志和指标标签
    pub name: String,
    /// 注册表预分配容量
    pub initial_capacity: usize,
    /// 单次加载器调用的超时时间（毫秒），`None` 表示不限制
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_timeout_ms: Option<u64>,
    /// 是否收集统计
    pub enable_metrics: bool,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            initial_capacity: 1024,
            load_timeout_ms: None,
            enable_metrics: true,
        }
    }
}

impl GroupConfig {
    /// 使用指定名称创建默认配置
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 设置加载超时
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// 设置注册表预分配容量
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// 加载超时
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// 验证配置
    ///
    /// # 返回值
    ///
    /// 配置合法时返回 `Ok(())`，否则返回描述问题的字符串
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Group name cannot be empty".to_string());
        }

        if self.initial_capacity > MAX_INITIAL_CAPACITY {
            return Err(format!(
                "Group '{}' initial_capacity cannot exceed {}",
                self.name, MAX_INITIAL_CAPACITY
            ));
        }

        if let Some(timeout) = self.load_timeout_ms {
            if timeout == 0 {
                return Err(format!(
                    "Group '{}' load_timeout_ms cannot be zero",
                    self.name
                ));
            }
            if timeout > MAX_LOAD_TIMEOUT_MS {
                return Err(format!(
                    "Group '{}' load_timeout_ms cannot exceed {} (1 hour)",
                    self.name, MAX_LOAD_TIMEOUT_MS
                ));
            }
        }

        Ok(())
    }

    /// 从 TOML 字符串解析并验证配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: GroupConfig =
            toml::from_str(content).map_err(|e| FlightError::Config(e.to_string()))?;
        config.validate().map_err(FlightError::Config)?;
        Ok(config)
    }

    /// 从 TOML 文件读取并验证配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML 字符串
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FlightError::Config(e.to_string()))
    }
}
