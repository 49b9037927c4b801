//! multiflight - 批量键请求合并库
//!
//! 当多个并发调用方请求有重叠的键集合时，每个键在同一时间最多只加载一次，
//! 所有等待该键的调用方共享同一个结果。未命中的键会合并为一次多键加载器调用。
//!
//! 记录只在加载进行期间存在，完成后立即丢弃，本库不提供持久缓存。

#![doc(html_root_url = "https://docs.rs/multiflight/0.1.0")]

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod flight;
pub mod loader;
pub mod metrics;
pub mod telemetry;

// Re-export commonly used items
pub use config::GroupConfig;
pub use context::Context;
pub use error::{BoxError, FlightError, Result};
pub use flight::Group;
pub use loader::{LoadResult, Loader};
pub use metrics::{GroupStats, StatsSnapshot};

/// multiflight 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
