//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块负责对一批未命中的键调用加载器，并把结果分发给对应的在途记录。

use super::entry::{Entry, Outcome};
use super::registry::Registry;
use crate::context::Context;
use crate::error::{FlightError, Result};
use crate::loader::Loader;
use crate::metrics::GroupStats;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// 一次批量加载
///
/// 持有本次调用新建的记录。正常结束时由 [`Dispatch::run`] 完成这些记录；
/// 如果在完成之前被丢弃（调用方的 future 被取消或加载器 panic），
/// `Drop` 会以 [`FlightError::Abandoned`] 完成它们并移出注册表，
/// 保证等待同一批键的其他调用方不会永久挂起。
pub(crate) struct Dispatch<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    registry: &'a Registry<K, V>,
    stats: Option<&'a GroupStats>,
    group: &'a str,
    batch: Vec<Arc<Entry<K, V>>>,
    settled: bool,
}

impl<'a, K, V> Dispatch<'a, K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        registry: &'a Registry<K, V>,
        stats: Option<&'a GroupStats>,
        group: &'a str,
        batch: Vec<Arc<Entry<K, V>>>,
    ) -> Self {
        Self {
            registry,
            stats,
            group,
            batch,
            settled: false,
        }
    }

    /// 调用加载器并分发结果
    ///
    /// 加载器执行期间不持有注册表的锁
    ///
    /// # 参数
    ///
    /// * `ctx` - 调用方上下文，原样转发给加载器
    /// * `loader` - 加载器
    /// * `timeout` - 可选的加载超时
    #[instrument(
        skip_all,
        level = "debug",
        fields(group = %self.group, batch_size = self.batch.len())
    )]
    pub(crate) async fn run<L>(mut self, ctx: &Context, loader: &L, timeout: Option<Duration>)
    where
        L: Loader<K, V> + ?Sized,
    {
        let keys: Vec<K> = self.batch.iter().map(|e| e.key().clone()).collect();
        let batch_size = keys.len();
        let started = Instant::now();

        let result = match timeout {
            Some(limit) => {
                let load_ctx = ctx.with_timeout(limit);
                match tokio::time::timeout(limit, loader.load(load_ctx.clone(), keys)).await {
                    Ok(result) => result.map_err(FlightError::load),
                    Err(_) => {
                        // 通知仍在后台运行的加载工作停止
                        load_ctx.cancel();
                        Err(FlightError::Timeout(
                            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        ))
                    }
                }
            }
            None => loader
                .load(ctx.clone(), keys)
                .await
                .map_err(FlightError::load),
        };

        let elapsed = started.elapsed();
        if let Some(stats) = self.stats {
            stats.record_load(batch_size, elapsed);
        }
        debug!(elapsed_ms = elapsed.as_millis() as u64, "loader returned");

        self.settle(result);
    }

    /// 在一次加锁内完成整批记录
    fn settle(&mut self, result: Result<HashMap<K, V>>) {
        self.settled = true;

        match result {
            Err(err) => {
                warn!(
                    "Load failed for {} keys in group {}: {}",
                    self.batch.len(),
                    self.group,
                    err
                );
                if let Some(stats) = self.stats {
                    match err {
                        FlightError::Timeout(_) => stats.record_timeout(),
                        _ => stats.record_load_failure(),
                    }
                }
                self.registry
                    .complete_batch(&self.batch, |_| Outcome::Failed(err.clone()));
            }
            Ok(mut values) => {
                let mut not_found = 0;
                self.registry
                    .complete_batch(&self.batch, |key| match values.remove(key) {
                        Some(value) => Outcome::Value(value),
                        None => {
                            not_found += 1;
                            Outcome::NotFound
                        }
                    });
                if not_found > 0 {
                    debug!(not_found, "loader omitted keys");
                    if let Some(stats) = self.stats {
                        stats.record_not_found(not_found);
                    }
                }
            }
        }
    }
}

impl<K, V> Drop for Dispatch<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let abandoned = self
            .registry
            .complete_batch(&self.batch, |_| Outcome::Failed(FlightError::Abandoned));
        if abandoned > 0 {
            warn!(
                "Abandoned {} in-flight keys in group {} before the load completed",
                abandoned, self.group
            );
            if let Some(stats) = self.stats {
                stats.record_abandoned(abandoned);
            }
        }
    }
}
