//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求合并组的错误类型。

use std::sync::Arc;
use thiserror::Error;

/// 加载器返回的错误类型
///
/// 加载器可以返回任意错误，组内部会将其包装为可共享的 [`FlightError::Load`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 请求合并错误类型枚举
///
/// 同一个批次的所有等待者会收到同一个错误，因此该类型必须可以廉价克隆
#[derive(Error, Debug, Clone)]
pub enum FlightError {
    /// 加载器失败，消息与加载器返回的错误完全一致
    #[error(transparent)]
    Load(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// 加载器超过了配置的超时时间（毫秒）
    #[error("loader timed out after {0}ms")]
    Timeout(u64),

    /// 负责加载的调用在完成前被丢弃或发生了panic
    #[error("in-flight load was abandoned before completion")]
    Abandoned,

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO错误
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

impl FlightError {
    /// 将加载器错误包装为可共享的错误
    pub fn load(err: BoxError) -> Self {
        FlightError::Load(Arc::from(err))
    }

    /// 是否为加载器自身返回的错误
    pub fn is_load(&self) -> bool {
        matches!(self, FlightError::Load(_))
    }
}

impl From<std::io::Error> for FlightError {
    fn from(err: std::io::Error) -> Self {
        FlightError::Io(Arc::new(err))
    }
}

/// 请求合并操作结果类型别名
pub type Result<T> = std::result::Result<T, FlightError>;
