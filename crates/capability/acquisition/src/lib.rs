//! # 采集引擎模块
//!
//! 把协议驱动、时序存储组合成后台采集引擎，对外提供注册与查询入口。
//!
//! ## 架构设计
//!
//! ```text
//!                    Engine（进程内唯一，显式构造后注入）
//!                       │
//!        ┌──────────────┼────────────────────┐
//!        ▼              ▼                    ▼
//! PollingScheduler  ConnectionRegistry   QueryService
//!   （每设备一任务）  （每键一个驱动，空闲回收）  （只读存储）
//!        │              ▲                    │
//!        └── lease ─────┘                    ▼
//!        │                           SampleStore / DailyAggregateStore
//!        ├──► SnapshotCache（快照 + 环形缓冲）
//!        ├──► StatisticsBook（成功/失败/连续失败）
//!        ├──► SampleStore（原始采样）
//!        └──► EnergyAccumulator ──► DailyAggregateStore（小时列 upsert）
//! ```
//!
//! ## 失败语义
//!
//! - 传输失败：快照 `error` 置位、`connected = false`，下一个 tick 自然重试
//! - 单点失败：`PointReading::Unavailable`，不写入原始采样
//! - 存储失败：记录日志，快照与环形缓冲照常更新；查询返回空结果或默认值

mod energy;
mod engine;
mod error;
mod query;
mod registry;
mod scheduler;
mod snapshot;
mod stats;

pub use energy::{EnergyAccumulator, EnergyUpdate};
pub use engine::{DeviceStatus, Engine, EngineSettings};
pub use error::AcquisitionError;
pub use query::{
    DailyTotal, DayData, EnergySummary, HistoryWindow, QueryService, SUMMARY_WINDOW_DAYS,
    end_of_day_ms, start_of_day_ms,
};
pub use registry::{ConnectionRegistry, DriverLease, SharedDriver};
pub use scheduler::{PollContext, PollRegistration, PollingScheduler};
pub use snapshot::SnapshotCache;
pub use stats::{HealthTransition, StatisticsBook};
