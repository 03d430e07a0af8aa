pub mod data;
pub mod device;
pub mod reading;
pub mod stats;

pub use data::{DailyAggregateRow, HOURS_PER_DAY, RawSample};
pub use device::{DeviceKey, ProtocolKind};
pub use reading::{PointId, PointReading, ReadOutcome, Snapshot, all_unavailable, all_zero};
pub use stats::{DeviceHealth, PollingStatistics};

/// 获取当前时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
