//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志和链路追踪的初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// 初始化 tracing 和 OpenTelemetry
///
/// 此函数应该在应用程序启动时调用一次。日志级别由 `RUST_LOG` 控制，默认 `info`。
/// 全局 subscriber 已经存在时（例如测试中重复调用）静默忽略。
///
/// # 参数
///
/// * `service_name` - 服务名称，作为 tracer 名称
/// * `json` - 是否以 JSON 格式输出日志
pub fn init_tracing(service_name: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // 未配置 exporter 时 provider 不导出 span，仅保留 OpenTelemetry 上下文
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    let subscriber = Registry::default().with(filter).with(telemetry);

    let result = if json {
        tracing::subscriber::set_global_default(subscriber.with(fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(subscriber.with(fmt::layer()))
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}

/// 关闭全局 tracer provider，刷新尚未导出的 span
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
}
