//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了在途键的注册表。

use super::entry::{Entry, Outcome};
use ahash::AHashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 一次批量解析的结果
pub(crate) struct Resolved<K, V> {
    /// 按输入顺序排列的全部记录，重复键指向同一条记录
    pub(crate) entries: Vec<Arc<Entry<K, V>>>,
    /// 本次新建、需要由调用方负责加载的记录
    pub(crate) misses: Vec<Arc<Entry<K, V>>>,
}

/// 在途注册表
///
/// 键存在当且仅当其加载仍在进行中。所有插入和删除都在同一把锁下完成，
/// 锁不会跨越 `.await` 持有。
pub(crate) struct Registry<K, V> {
    entries: Mutex<AHashMap<K, Arc<Entry<K, V>>>>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(AHashMap::with_capacity(capacity)),
        }
    }

    // 每次增删都是完整的单步操作，锁中毒后映射本身仍然一致
    fn lock(&self) -> MutexGuard<'_, AHashMap<K, Arc<Entry<K, V>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 在一次加锁内为整批键查找或创建记录
    ///
    /// 同一批中重复出现的键，第二次及之后都会命中第一次创建的记录
    pub(crate) fn resolve_batch(&self, keys: impl IntoIterator<Item = K>) -> Resolved<K, V> {
        let keys = keys.into_iter();
        let mut entries = Vec::with_capacity(keys.size_hint().0);
        let mut misses = Vec::new();

        let mut map = self.lock();
        for key in keys {
            if let Some(entry) = map.get(&key) {
                entries.push(entry.clone());
                continue;
            }
            let entry = Arc::new(Entry::new(key.clone()));
            map.insert(key, entry.clone());
            entries.push(entry.clone());
            misses.push(entry);
        }

        Resolved { entries, misses }
    }

    /// 在一次加锁内完成一批记录并将其移出注册表
    ///
    /// 已经完成的记录会被跳过，返回本次实际完成的记录数
    pub(crate) fn complete_batch<F>(&self, batch: &[Arc<Entry<K, V>>], mut outcome_for: F) -> usize
    where
        F: FnMut(&K) -> Outcome<V>,
    {
        let mut map = self.lock();
        let mut completed = 0;
        for entry in batch {
            if entry.is_complete() {
                continue;
            }
            if entry.complete(outcome_for(entry.key())) {
                completed += 1;
            }
            if map
                .get(entry.key())
                .is_some_and(|current| Arc::ptr_eq(current, entry))
            {
                map.remove(entry.key());
            }
        }
        completed
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }
}
