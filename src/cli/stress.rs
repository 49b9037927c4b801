//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 并发压力测试命令：大量工作任务对同一个组发起有重叠的批量请求，
//! 校验每个返回值，并在结束后确认没有残留的在途记录。

use crate::cli::StressArgs;
use crate::config::GroupConfig;
use crate::context::Context;
use crate::flight::Group;
use crate::loader::LoadResult;
use crate::metrics::StatsSnapshot;
use anyhow::{bail, ensure, Context as _, Result};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// 压测报告
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub group: String,
    pub workers: usize,
    pub loops: usize,
    pub batch_size: usize,
    pub key_pool: usize,
    pub elapsed_ms: u64,
    /// 校验通过的键数
    pub verified_keys: u64,
    /// 结束后残留的在途记录数，正常应为 0
    pub in_flight_after: usize,
    pub stats: StatsSnapshot,
}

fn expected_value(key: u64) -> String {
    format!("val: {}", key)
}

/// 执行压测并返回报告
pub async fn run_stress(args: &StressArgs) -> Result<StressReport> {
    ensure!(args.workers > 0, "--workers must be positive");
    ensure!(args.batch_size > 0, "--batch-size must be positive");
    ensure!(
        args.keys > args.batch_size,
        "--keys ({}) must be greater than --batch-size ({})",
        args.keys,
        args.batch_size
    );

    let config = match &args.config {
        Some(path) => GroupConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GroupConfig::named("stress"),
    };
    let group = Arc::new(Group::<u64, String>::with_config(config)?);

    let max_sleep_ms = args.max_sleep_ms;
    let loader = Arc::new(move |_ctx: Context, keys: Vec<u64>| {
        let delay = if max_sleep_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..max_sleep_ms))
        };
        async move {
            tokio::time::sleep(delay).await;
            let values: LoadResult<u64, String> = Ok(keys
                .into_iter()
                .map(|k| (k, expected_value(k)))
                .collect());
            values
        }
    });

    info!(
        "Starting stress run: {} workers x {} loops, batch {} from {} keys",
        args.workers, args.loops, args.batch_size, args.keys
    );
    let started = Instant::now();

    let mut handles = Vec::with_capacity(args.workers);
    for _ in 0..args.workers {
        let group = group.clone();
        let loader = loader.clone();
        let (loops, batch_size, pool) = (args.loops, args.batch_size, args.keys);

        handles.push(tokio::spawn(async move {
            let ctx = Context::background();
            let mut verified = 0u64;
            for _ in 0..loops {
                let from = rand::thread_rng().gen_range(0..pool - batch_size) as u64;
                let keys: Vec<u64> = (from..from + batch_size as u64).collect();

                let values = group.load_many(&ctx, keys.iter().copied(), &*loader).await?;
                ensure!(
                    values.len() == keys.len(),
                    "expected {} values, got {}",
                    keys.len(),
                    values.len()
                );
                for key in &keys {
                    match values.get(key) {
                        Some(value) if *value == expected_value(*key) => verified += 1,
                        Some(value) => bail!("key {} returned unexpected value {:?}", key, value),
                        None => bail!("key {} missing from result", key),
                    }
                }
            }
            Ok::<u64, anyhow::Error>(verified)
        }));
    }

    let mut verified_keys = 0;
    for result in futures::future::try_join_all(handles).await? {
        verified_keys += result?;
    }

    let report = StressReport {
        group: group.name().to_string(),
        workers: args.workers,
        loops: args.loops,
        batch_size: args.batch_size,
        key_pool: args.keys,
        elapsed_ms: started.elapsed().as_millis() as u64,
        verified_keys,
        in_flight_after: group.in_flight(),
        stats: group.stats(),
    };

    ensure!(
        report.in_flight_after == 0,
        "{} entries left in flight after all workers finished",
        report.in_flight_after
    );
    Ok(report)
}

pub async fn execute(args: &StressArgs) -> Result<()> {
    let report = run_stress(args).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if args.prometheus {
        print!("{}", report.stats.to_prometheus(&report.group));
        return Ok(());
    }

    println!("=== Stress Run: {} ===\n", report.group);
    println!(
        "Workers: {}  Loops: {}  Batch: {}  Key pool: {}",
        report.workers, report.loops, report.batch_size, report.key_pool
    );
    println!("Elapsed: {}ms", report.elapsed_ms);
    println!("Verified keys: {}", report.verified_keys);
    println!("Loader calls: {}", report.stats.loads);
    println!("Keys loaded: {}", report.stats.misses);
    println!(
        "Coalesced: {} ({:.1}%)",
        report.stats.hits,
        report.stats.hit_ratio() * 100.0
    );
    println!("Avg batch size: {:.2}", report.stats.avg_batch_size());
    println!("\nLoads by batch size:");
    for (size, count) in &report.stats.batch_sizes {
        println!("  {:>4}: {}", size, count);
    }

    Ok(())
}
