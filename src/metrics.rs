//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求合并组的运行时统计。
//!
//! 统计数据归属于单个组实例，不存在进程级的全局状态。

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// 统计收集器
#[derive(Debug, Default)]
pub struct GroupStats {
    /// `load_many` 调用次数
    requests: AtomicU64,
    /// 请求的键总数（含重复）
    keys_requested: AtomicU64,
    /// 命中已在途记录的键数
    hits: AtomicU64,
    /// 新建记录、需要加载的键数
    misses: AtomicU64,
    /// 加载器调用次数
    loads: AtomicU64,
    /// 加载器失败次数
    load_failures: AtomicU64,
    /// 加载器超时次数
    timeouts: AtomicU64,
    /// 加载成功但未返回的键数
    not_found: AtomicU64,
    /// 因调用被丢弃而放弃的键数
    abandoned: AtomicU64,
    /// 加载器累计耗时（微秒）
    load_time_micros: AtomicU64,
    /// 批大小 -> 加载次数
    batch_sizes: Mutex<BTreeMap<usize, u64>>,
}

impl GroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次批量请求的命中情况
    pub(crate) fn record_request(&self, keys: usize, hits: usize, misses: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.keys_requested.fetch_add(keys as u64, Ordering::Relaxed);
        self.hits.fetch_add(hits as u64, Ordering::Relaxed);
        self.misses.fetch_add(misses as u64, Ordering::Relaxed);
    }

    /// 记录一次加载器调用
    pub(crate) fn record_load(&self, batch_size: usize, elapsed: Duration) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.load_time_micros.fetch_add(micros, Ordering::Relaxed);
        let mut sizes = self
            .batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *sizes.entry(batch_size).or_insert(0) += 1;
    }

    pub(crate) fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_found(&self, keys: usize) {
        self.not_found.fetch_add(keys as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self, keys: usize) {
        self.abandoned.fetch_add(keys as u64, Ordering::Relaxed);
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> StatsSnapshot {
        let batch_sizes = self
            .batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            keys_requested: self.keys_requested.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            load_time_micros: self.load_time_micros.load(Ordering::Relaxed),
            batch_sizes,
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub keys_requested: u64,
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub timeouts: u64,
    pub not_found: u64,
    pub abandoned: u64,
    pub load_time_micros: u64,
    pub batch_sizes: BTreeMap<usize, u64>,
}

impl StatsSnapshot {
    /// 合并率：命中在途记录的键占全部请求键的比例
    pub fn hit_ratio(&self) -> f64 {
        if self.keys_requested == 0 {
            return 0.0;
        }
        self.hits as f64 / self.keys_requested as f64
    }

    /// 每次加载的平均键数
    pub fn avg_batch_size(&self) -> f64 {
        if self.loads == 0 {
            return 0.0;
        }
        self.misses as f64 / self.loads as f64
    }

    /// 按 Prometheus 文本格式输出
    ///
    /// # 参数
    ///
    /// * `group` - 组名称，作为 `group` 标签
    pub fn to_prometheus(&self, group: &str) -> String {
        let mut output = String::new();
        let counters = [
            ("multiflight_requests_total", self.requests),
            ("multiflight_keys_requested_total", self.keys_requested),
            ("multiflight_hits_total", self.hits),
            ("multiflight_misses_total", self.misses),
            ("multiflight_loads_total", self.loads),
            ("multiflight_load_failures_total", self.load_failures),
            ("multiflight_load_timeouts_total", self.timeouts),
            ("multiflight_not_found_total", self.not_found),
            ("multiflight_abandoned_total", self.abandoned),
        ];
        for (name, value) in counters {
            let _ = writeln!(output, "{}{{group=\"{}\"}} {}", name, group, value);
        }
        let _ = writeln!(
            output,
            "multiflight_load_duration_seconds_sum{{group=\"{}\"}} {}",
            group,
            self.load_time_micros as f64 / 1_000_000.0
        );
        for (size, count) in &self.batch_sizes {
            let _ = writeln!(
                output,
                "multiflight_load_batch_size{{group=\"{}\", size=\"{}\"}} {}",
                group, size, count
            );
        }
        output
    }
}
