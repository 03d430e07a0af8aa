//! 内存存储实现模块
//!
//! 仅用于本地演示和测试（未配置数据库时的默认后端）。
//!
//! 包含以下实现：
//! - SampleStore: InMemorySampleStore
//! - DailyAggregateStore: InMemoryDailyAggregateStore

pub mod daily;
pub mod samples;

pub use daily::*;
pub use samples::*;
