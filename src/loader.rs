//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了多键加载器的接口。

use crate::context::Context;
use crate::error::BoxError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;

/// 加载器的返回类型
pub type LoadResult<K, V> = std::result::Result<HashMap<K, V>, BoxError>;

/// 多键加载器特征
///
/// 组每处理一批未命中的键就调用一次 `load`，传入的 `keys` 永远不为空。
///
/// - 返回的映射可以只包含 `keys` 的一个子集，缺失的键视为"未找到"，
///   不会导致整个批次失败
/// - 返回错误时，该批次中的每一个键都会收到这个错误
///
/// 任何 `Fn(Context, Vec<K>) -> impl Future<Output = LoadResult<K, V>>`
/// 形式的闭包都自动实现了该特征。
#[async_trait]
pub trait Loader<K, V>: Send + Sync
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// 批量加载
    ///
    /// # 参数
    ///
    /// * `ctx` - 调用方的上下文，加载器可以据此响应取消或截止时间
    /// * `keys` - 需要加载的键，不为空且不含重复项
    ///
    /// # 返回值
    ///
    /// 返回已找到的键值映射，或者整个批次的错误
    async fn load(&self, ctx: Context, keys: Vec<K>) -> LoadResult<K, V>;
}

#[async_trait]
impl<K, V, F, Fut> Loader<K, V> for F
where
    K: Send + 'static,
    V: Send + 'static,
    F: Fn(Context, Vec<K>) -> Fut + Send + Sync,
    Fut: Future<Output = LoadResult<K, V>> + Send + 'static,
{
    async fn load(&self, ctx: Context, keys: Vec<K>) -> LoadResult<K, V> {
        (self)(ctx, keys).await
    }
}
