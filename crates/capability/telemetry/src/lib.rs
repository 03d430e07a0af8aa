//! 追踪、请求 ID 生成与采集计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 采集指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub poll_attempts: u64,
    pub poll_successes: u64,
    pub poll_failures: u64,
    pub poll_zero_responses: u64,
    pub skipped_ticks: u64,
    pub poll_latency_ms_total: u64,
    pub poll_latency_ms_count: u64,
    pub samples_written: u64,
    pub storage_write_failures: u64,
    pub energy_upserts: u64,
    pub adhoc_reads: u64,
    pub adhoc_writes: u64,
    pub reaper_evictions: u64,
}

/// 采集指标（进程级）。
pub struct TelemetryMetrics {
    poll_attempts: AtomicU64,
    poll_successes: AtomicU64,
    poll_failures: AtomicU64,
    poll_zero_responses: AtomicU64,
    skipped_ticks: AtomicU64,
    poll_latency_ms_total: AtomicU64,
    poll_latency_ms_count: AtomicU64,
    samples_written: AtomicU64,
    storage_write_failures: AtomicU64,
    energy_upserts: AtomicU64,
    adhoc_reads: AtomicU64,
    adhoc_writes: AtomicU64,
    reaper_evictions: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            poll_attempts: AtomicU64::new(0),
            poll_successes: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            poll_zero_responses: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
            poll_latency_ms_total: AtomicU64::new(0),
            poll_latency_ms_count: AtomicU64::new(0),
            samples_written: AtomicU64::new(0),
            storage_write_failures: AtomicU64::new(0),
            energy_upserts: AtomicU64::new(0),
            adhoc_reads: AtomicU64::new(0),
            adhoc_writes: AtomicU64::new(0),
            reaper_evictions: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_attempts: self.poll_attempts.load(Ordering::Relaxed),
            poll_successes: self.poll_successes.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            poll_zero_responses: self.poll_zero_responses.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            poll_latency_ms_total: self.poll_latency_ms_total.load(Ordering::Relaxed),
            poll_latency_ms_count: self.poll_latency_ms_count.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            storage_write_failures: self.storage_write_failures.load(Ordering::Relaxed),
            energy_upserts: self.energy_upserts.load(Ordering::Relaxed),
            adhoc_reads: self.adhoc_reads.load(Ordering::Relaxed),
            adhoc_writes: self.adhoc_writes.load(Ordering::Relaxed),
            reaper_evictions: self.reaper_evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录一次轮询尝试。
pub fn record_poll_attempt() {
    metrics().poll_attempts.fetch_add(1, Ordering::Relaxed);
}

/// 记录轮询成功。
pub fn record_poll_success() {
    metrics().poll_successes.fetch_add(1, Ordering::Relaxed);
}

/// 记录轮询失败（传输错误或全部点位不可用）。
pub fn record_poll_failure() {
    metrics().poll_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录全零响应。
pub fn record_poll_zero_response() {
    metrics().poll_zero_responses.fetch_add(1, Ordering::Relaxed);
}

/// 记录因上一次轮询未完成而跳过的 tick 数。
pub fn record_skipped_ticks(count: u64) {
    metrics().skipped_ticks.fetch_add(count, Ordering::Relaxed);
}

/// 记录单次轮询耗时（毫秒）。
pub fn record_poll_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .poll_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .poll_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录写入的原始采样条数。
pub fn record_samples_written(count: u64) {
    metrics().samples_written.fetch_add(count, Ordering::Relaxed);
}

/// 记录存储写入失败次数。
pub fn record_storage_write_failure() {
    metrics()
        .storage_write_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录小时列写入次数。
pub fn record_energy_upsert() {
    metrics().energy_upserts.fetch_add(1, Ordering::Relaxed);
}

/// 记录临时读取次数。
pub fn record_adhoc_read() {
    metrics().adhoc_reads.fetch_add(1, Ordering::Relaxed);
}

/// 记录临时写入次数。
pub fn record_adhoc_write() {
    metrics().adhoc_writes.fetch_add(1, Ordering::Relaxed);
}

/// 记录空闲回收的驱动数。
pub fn record_reaper_evictions(count: u64) {
    metrics()
        .reaper_evictions
        .fetch_add(count, Ordering::Relaxed);
}
