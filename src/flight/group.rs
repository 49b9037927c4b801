//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求合并组，是批量加载的入口。

use super::dispatch::Dispatch;
use super::entry::Outcome;
use super::registry::{Registry, Resolved};
use crate::config::GroupConfig;
use crate::context::Context;
use crate::error::{FlightError, Result};
use crate::loader::Loader;
use crate::metrics::{GroupStats, StatsSnapshot};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::{debug, instrument};

/// 请求合并组
///
/// 对同一个组并发发起的批量请求中，每个键在同一时间最多只有一次加载在进行，
/// 所有等待该键的调用方拿到同一个结果。加载完成后记录立即移出，
/// 之后对同一个键的请求会触发新的加载。
///
/// 组之间互不共享状态，通常通过 `Arc<Group<K, V>>` 在任务间共享。
///
/// # 示例
///
/// ```no_run
/// use multiflight::{Context, Group, LoadResult};
///
/// # async fn example() -> multiflight::Result<()> {
/// let group: Group<u64, String> = Group::new();
/// let loader = |_ctx: Context, keys: Vec<u64>| async move {
///     let values: LoadResult<u64, String> =
///         Ok(keys.into_iter().map(|k| (k, format!("user-{}", k))).collect());
///     values
/// };
///
/// let users = group
///     .load_many(&Context::background(), vec![1, 2, 2, 3], &loader)
///     .await?;
/// assert_eq!(users.len(), 3);
/// # Ok(())
/// # }
/// ```
pub struct Group<K, V>
where
    K: Eq + Hash + Clone,
{
    registry: Registry<K, V>,
    config: GroupConfig,
    stats: GroupStats,
}

impl<K, V> Group<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// 使用默认配置创建组
    pub fn new() -> Self {
        Self::build(GroupConfig::default())
    }

    /// 使用指定配置创建组
    ///
    /// # 参数
    ///
    /// * `config` - 组配置
    ///
    /// # 返回值
    ///
    /// 配置不合法时返回 [`FlightError::Config`]
    pub fn with_config(config: GroupConfig) -> Result<Self> {
        config.validate().map_err(FlightError::Config)?;
        Ok(Self::build(config))
    }

    fn build(config: GroupConfig) -> Self {
        Self {
            registry: Registry::with_capacity(config.initial_capacity),
            config,
            stats: GroupStats::new(),
        }
    }

    /// 批量加载
    ///
    /// 已经在途的键直接等待已有的加载，其余的键合并为一次加载器调用。
    /// `keys` 可以为空，也可以包含重复项。
    ///
    /// # 参数
    ///
    /// * `ctx` - 转发给加载器的上下文；取消它不会提前结束对在途键的等待
    /// * `keys` - 需要加载的键
    /// * `loader` - 加载器
    ///
    /// # 返回值
    ///
    /// 成功时返回加载器找到的所有键值（重复键只出现一次，未找到的键被省略）；
    /// 按输入顺序遇到的第一个失败的键对应的错误会直接返回，不返回部分结果
    #[instrument(
        skip_all,
        level = "debug",
        fields(group = %self.config.name, key_count = tracing::field::Empty)
    )]
    pub async fn load_many<I, L>(&self, ctx: &Context, keys: I, loader: &L) -> Result<HashMap<K, V>>
    where
        I: IntoIterator<Item = K>,
        L: Loader<K, V> + ?Sized,
    {
        let Resolved { entries, misses } = self.registry.resolve_batch(keys);
        if entries.is_empty() {
            return Ok(HashMap::new());
        }

        tracing::Span::current().record("key_count", entries.len());
        let hits = entries.len() - misses.len();
        debug!(hits, misses = misses.len(), "resolved in-flight entries");
        if let Some(stats) = self.stats_sink() {
            stats.record_request(entries.len(), hits, misses.len());
        }

        if !misses.is_empty() {
            Dispatch::new(&self.registry, self.stats_sink(), &self.config.name, misses)
                .run(ctx, loader, self.config.load_timeout())
                .await;
        }

        let mut result = HashMap::with_capacity(entries.len());
        for entry in &entries {
            match entry.wait().await {
                Outcome::Value(value) => {
                    if !result.contains_key(entry.key()) {
                        result.insert(entry.key().clone(), value.clone());
                    }
                }
                Outcome::NotFound => {}
                // 其他记录仍归注册表所有，会为别的等待者独立完成
                Outcome::Failed(err) => return Err(err.clone()),
            }
        }

        Ok(result)
    }

    /// 加载单个键
    ///
    /// 加载器没有返回该键时返回 `Ok(None)`
    pub async fn load_one<L>(&self, ctx: &Context, key: K, loader: &L) -> Result<Option<V>>
    where
        L: Loader<K, V> + ?Sized,
    {
        let mut values = self
            .load_many(ctx, std::iter::once(key.clone()), loader)
            .await?;
        Ok(values.remove(&key))
    }

    fn stats_sink(&self) -> Option<&GroupStats> {
        self.config.enable_metrics.then_some(&self.stats)
    }
}

impl<K, V> Group<K, V>
where
    K: Eq + Hash + Clone,
{
    /// 当前在途的键数量
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    /// 是否没有任何在途的键
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// 指定的键是否正在加载
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.registry.contains(key)
    }

    /// 统计快照，关闭统计时各项均为零
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &GroupConfig {
        &self.config
    }
}

impl<K, V> Default for Group<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for Group<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.config.name)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
