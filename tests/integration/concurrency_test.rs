//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 并发请求合并测试

#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use common::{echo_value, setup_logging, wait_until, GatedLoader};
use multiflight::cli::{run_stress, StressArgs};
use multiflight::{Context, Group, LoadResult, Loader};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

const ALL_KEYS: u64 = 500;
const WORKERS: usize = 1000;
const LOOPS: usize = 5;
const BATCH_SIZE: u64 = 20;

/// 检测同一个键是否被并发加载的加载器
#[derive(Default)]
struct ExclusiveLoader {
    loading: Mutex<HashSet<u64>>,
    loads: AtomicUsize,
    keys_loaded: AtomicUsize,
    overlaps: AtomicUsize,
}

#[async_trait]
impl Loader<u64, String> for ExclusiveLoader {
    async fn load(&self, _ctx: Context, keys: Vec<u64>) -> LoadResult<u64, String> {
        {
            let mut loading = self.loading.lock().unwrap();
            for key in &keys {
                if !loading.insert(*key) {
                    self.overlaps.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.keys_loaded.fetch_add(keys.len(), Ordering::SeqCst);

        let sleep = rand::thread_rng().gen_range(0..20);
        tokio::time::sleep(Duration::from_millis(sleep)).await;

        {
            let mut loading = self.loading.lock().unwrap();
            for key in &keys {
                loading.remove(key);
            }
        }
        Ok(keys.into_iter().map(|k| (k, echo_value(k))).collect())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_overlapping_batches_share_in_flight_keys() {
    setup_logging();

    let group = Arc::new(Group::<u64, String>::new());
    let (loader, mut started) = GatedLoader::new();
    let loader = Arc::new(loader);

    let first = {
        let (group, loader) = (group.clone(), loader.clone());
        tokio::spawn(async move {
            group
                .load_many(&Context::background(), vec![1, 2, 3], &*loader)
                .await
        })
    };
    assert_eq!(started.recv().await.unwrap(), vec![1, 2, 3]);

    let second = {
        let (group, loader) = (group.clone(), loader.clone());
        tokio::spawn(async move {
            group
                .load_many(&Context::background(), vec![2, 3, 4], &*loader)
                .await
        })
    };
    // 第二个请求只需要加载尚未在途的键
    assert_eq!(started.recv().await.unwrap(), vec![4]);
    assert_eq!(group.in_flight(), 4);

    loader.release(2);

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 3);
    for key in 2..=3 {
        assert_eq!(first.get(&key), second.get(&key));
    }
    assert_eq!(second.get(&4), Some(&echo_value(4)));

    assert_eq!(loader.call_count(), 2);
    assert!(group.is_idle());
    let stats = group.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_waiters_single_load() {
    let group = Arc::new(Group::<u64, String>::new());
    let (loader, mut started) = GatedLoader::new();
    let loader = Arc::new(loader);
    let callers = 64;
    let barrier = Arc::new(Barrier::new(callers));

    let mut handles = Vec::new();
    for _ in 0..callers {
        let (group, loader, barrier) = (group.clone(), loader.clone(), barrier.clone());
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            group
                .load_many(&Context::background(), vec![42], &*loader)
                .await
        }));
    }

    assert_eq!(started.recv().await.unwrap(), vec![42]);
    let watched = group.clone();
    wait_until("all callers to join the flight", || {
        watched.stats().requests == callers as u64
    })
    .await;
    loader.release(1);

    for handle in handles {
        let values = handle.await.unwrap().unwrap();
        assert_eq!(values.get(&42), Some(&echo_value(42)));
    }
    assert_eq!(loader.call_count(), 1);
    assert!(group.is_idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_failure_reaches_every_waiter() {
    setup_logging();

    let group = Arc::new(Group::<u64, String>::new());
    let (loader, mut started) = GatedLoader::failing("backend unavailable");
    let loader = Arc::new(loader);

    let owner = {
        let (group, loader) = (group.clone(), loader.clone());
        tokio::spawn(async move {
            group
                .load_many(&Context::background(), vec![1, 2], &*loader)
                .await
        })
    };
    started.recv().await.unwrap();

    // 只命中在途记录，不会触发新的加载
    let follower = {
        let (group, loader) = (group.clone(), loader.clone());
        tokio::spawn(async move {
            group
                .load_many(&Context::background(), vec![2], &*loader)
                .await
        })
    };
    let watched = group.clone();
    wait_until("follower to join the flight", || watched.stats().hits == 1).await;

    loader.release(1);

    let owner_err = owner.await.unwrap().unwrap_err();
    let follower_err = follower.await.unwrap().unwrap_err();
    assert_eq!(owner_err.to_string(), "backend unavailable");
    assert_eq!(follower_err.to_string(), "backend unavailable");
    assert_eq!(loader.call_count(), 1);
    assert!(group.is_idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 16)]
async fn test_random_overlapping_workload() {
    setup_logging();

    let group = Arc::new(Group::<u64, String>::new());
    let loader = Arc::new(ExclusiveLoader::default());

    let mut handles = Vec::with_capacity(WORKERS);
    for _ in 0..WORKERS {
        let (group, loader) = (group.clone(), loader.clone());
        handles.push(tokio::spawn(async move {
            let ctx = Context::background();
            for _ in 0..LOOPS {
                let from = rand::thread_rng().gen_range(0..ALL_KEYS - BATCH_SIZE);
                let keys: Vec<u64> = (from..from + BATCH_SIZE).collect();

                let values = group
                    .load_many(&ctx, keys.iter().copied(), &*loader)
                    .await
                    .unwrap();
                assert_eq!(values.len(), keys.len());
                for key in &keys {
                    assert_eq!(values.get(key), Some(&echo_value(*key)));
                }
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(group.is_idle(), "registry must be empty after all callers");
    assert_eq!(loader.overlaps.load(Ordering::SeqCst), 0);

    let stats = group.stats();
    assert_eq!(stats.requests, (WORKERS * LOOPS) as u64);
    assert_eq!(stats.keys_requested, WORKERS as u64 * LOOPS as u64 * BATCH_SIZE);
    assert_eq!(stats.loads, loader.loads.load(Ordering::SeqCst) as u64);
    assert_eq!(stats.misses, loader.keys_loaded.load(Ordering::SeqCst) as u64);
    assert_eq!(stats.hits + stats.misses, stats.keys_requested);
    tracing::info!(
        "load times: {}, batch sizes: {:?}",
        stats.loads,
        stats.batch_sizes
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stress_command() {
    let args = StressArgs {
        workers: 50,
        loops: 3,
        batch_size: 10,
        keys: 100,
        max_sleep_ms: 5,
        config: None,
        json: false,
        prometheus: false,
    };

    let report = run_stress(&args).await.unwrap();
    assert_eq!(report.verified_keys, 50 * 3 * 10);
    assert_eq!(report.in_flight_after, 0);
    assert_eq!(report.stats.requests, 150);
    assert_eq!(report.group, "stress");
}

#[tokio::test]
async fn test_stress_command_rejects_bad_args() {
    let args = StressArgs {
        workers: 1,
        loops: 1,
        batch_size: 10,
        keys: 10,
        max_sleep_ms: 0,
        config: None,
        json: false,
        prometheus: false,
    };
    assert!(run_stress(&args).await.is_err());
}
