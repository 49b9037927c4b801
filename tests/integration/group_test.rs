//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 批量请求合并的基本行为测试

#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use common::{echo_value, setup_logging, RecordingLoader};
use mockall::mock;
use multiflight::{Context, FlightError, Group, GroupConfig, LoadResult, Loader};
use std::collections::HashMap;
use std::time::Duration;

mock! {
    pub Backend {}

    #[async_trait]
    impl Loader<u64, String> for Backend {
        async fn load(&self, ctx: Context, keys: Vec<u64>) -> LoadResult<u64, String>;
    }
}

#[tokio::test]
async fn test_missing_keys_are_omitted() {
    setup_logging();

    let group: Group<u64, String> = Group::new();
    let loader = |_ctx: Context, keys: Vec<u64>| async move {
        assert_eq!(keys, vec![1, 2, 3]);
        let values: LoadResult<u64, String> =
            Ok(HashMap::from([(1, "a".to_string()), (3, "c".to_string())]));
        values
    };

    let values = group
        .load_many(&Context::background(), vec![1, 2, 3], &loader)
        .await
        .expect("omitted keys must not fail the call");

    assert_eq!(
        values,
        HashMap::from([(1, "a".to_string()), (3, "c".to_string())])
    );
    assert!(group.is_idle());
    assert_eq!(group.stats().not_found, 1);
}

#[tokio::test]
async fn test_loader_error_is_returned_verbatim() {
    setup_logging();

    let group: Group<u64, String> = Group::new();
    let loader = RecordingLoader::new().failing("backend unavailable");

    let err = group
        .load_many(&Context::background(), vec![1, 2], &loader)
        .await
        .unwrap_err();

    assert!(err.is_load());
    assert_eq!(err.to_string(), "backend unavailable");
    assert_eq!(loader.calls(), vec![vec![1, 2]]);
    assert!(group.is_idle());

    let stats = group.stats();
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.load_failures, 1);
}

#[tokio::test]
async fn test_duplicate_keys_load_once() {
    setup_logging();

    let mut backend = MockBackend::new();
    backend
        .expect_load()
        .times(1)
        .withf(|_ctx, keys| keys == &vec![5u64])
        .returning(|_ctx, keys| Ok(keys.into_iter().map(|k| (k, echo_value(k))).collect()));

    let group: Group<u64, String> = Group::new();
    let values = group
        .load_many(&Context::background(), vec![5, 5, 5], &backend)
        .await
        .unwrap();

    assert_eq!(values.len(), 1);
    assert_eq!(values.get(&5).map(String::as_str), Some("val: 5"));

    let stats = group.stats();
    assert_eq!(stats.keys_requested, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

#[tokio::test]
async fn test_empty_request_never_calls_loader() {
    let mut backend = MockBackend::new();
    backend.expect_load().never();

    let group: Group<u64, String> = Group::new();
    let values = group
        .load_many(&Context::background(), Vec::new(), &backend)
        .await
        .unwrap();
    assert!(values.is_empty());
}

#[tokio::test]
async fn test_completed_keys_are_not_cached() {
    let group: Group<u64, String> = Group::new();
    let loader = RecordingLoader::new();
    let ctx = Context::background();

    for _ in 0..3 {
        let values = group.load_many(&ctx, vec![10, 11], &loader).await.unwrap();
        assert_eq!(values.len(), 2);
    }

    assert_eq!(loader.call_count(), 3);
    assert!(group.is_idle());
}

#[tokio::test]
async fn test_failure_does_not_poison_later_loads() {
    let group: Group<u64, String> = Group::new();
    let ctx = Context::background();

    let failing = RecordingLoader::new().failing("boom");
    assert!(group.load_many(&ctx, vec![1], &failing).await.is_err());

    let healthy = RecordingLoader::new();
    let values = group.load_many(&ctx, vec![1], &healthy).await.unwrap();
    assert_eq!(values.get(&1), Some(&echo_value(1)));
}

#[tokio::test]
async fn test_loader_receives_caller_context() {
    let group: Group<u64, String> = Group::new();
    let loader = RecordingLoader::new();
    let ctx = Context::background().with_timeout(Duration::from_secs(30));

    group.load_many(&ctx, vec![1], &loader).await.unwrap();

    let seen = loader.contexts();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].deadline(), ctx.deadline());
    assert!(!seen[0].is_cancelled());
    ctx.cancel();
    assert!(seen[0].is_cancelled());
}

#[tokio::test]
async fn test_load_one() {
    let group: Group<u64, String> = Group::new();
    let loader = RecordingLoader::new().with_missing([2]);
    let ctx = Context::background();

    assert_eq!(
        group.load_one(&ctx, 1, &loader).await.unwrap(),
        Some(echo_value(1))
    );
    assert_eq!(group.load_one(&ctx, 2, &loader).await.unwrap(), None);
}

#[tokio::test]
async fn test_load_timeout_fails_batch() {
    setup_logging();

    let config = GroupConfig::named("slow").with_load_timeout(Duration::from_millis(20));
    let group: Group<u64, String> = Group::with_config(config).unwrap();
    let loader = RecordingLoader::new().with_delay(Duration::from_secs(5));

    let err = group
        .load_many(&Context::background(), vec![1, 2], &loader)
        .await
        .unwrap_err();

    assert!(matches!(err, FlightError::Timeout(20)));
    assert!(group.is_idle());
    assert_eq!(group.stats().timeouts, 1);

    // 超时后派生给加载器的上下文会被取消，调用方的上下文不受影响
    let seen = loader.contexts();
    assert!(seen[0].is_cancelled());
    assert!(seen[0].deadline().is_some());
}

#[tokio::test]
async fn test_dyn_loader() {
    let group: Group<u64, String> = Group::new();
    let loader: Box<dyn Loader<u64, String>> = Box::new(RecordingLoader::new());

    let values = group
        .load_many(&Context::background(), 0..4u64, loader.as_ref())
        .await
        .unwrap();
    assert_eq!(values.len(), 4);
}
