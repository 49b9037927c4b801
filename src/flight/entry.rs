//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了单个键的在途记录。

use crate::error::FlightError;
use std::sync::OnceLock;
use tokio::sync::Notify;

/// 单个键的加载结果
#[derive(Debug, Clone)]
pub(crate) enum Outcome<V> {
    /// 加载器返回了该键的值
    Value(V),
    /// 加载成功，但返回结果中没有该键
    NotFound,
    /// 该键所在的批次失败
    Failed(FlightError),
}

/// 在途记录
///
/// 由发起加载的调用写入一次，之后任意数量的等待者只读。
/// `outcome` 的写入先于 `notify_waiters`，所以等待者被唤醒后一定能读到结果。
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    key: K,
    outcome: OnceLock<Outcome<V>>,
    done: Notify,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K) -> Self {
        Self {
            key,
            outcome: OnceLock::new(),
            done: Notify::new(),
        }
    }

    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    /// 写入结果并唤醒所有等待者
    ///
    /// 只有第一次调用生效，返回值表示本次调用是否完成了该记录
    pub(crate) fn complete(&self, outcome: Outcome<V>) -> bool {
        if self.outcome.set(outcome).is_err() {
            return false;
        }
        self.done.notify_waiters();
        true
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// 等待结果
    pub(crate) async fn wait(&self) -> &Outcome<V> {
        loop {
            // 先注册再检查，避免在检查和等待之间错过通知
            let notified = self.done.notified();
            if let Some(outcome) = self.outcome.get() {
                return outcome;
            }
            notified.await;
        }
    }
}
