//! # EMS Storage 模块
//!
//! 时序数据存储抽象层，支持内存与 PostgreSQL 两种后端。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：`SampleStore` 与 `DailyAggregateStore`
//! 2. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 3. **验证辅助层** (`validation.rs`)：小时下标与日期范围校验
//! 4. **连接管理层** (`connection.rs`)：数据库连接池管理
//! 5. **实现层**：
//!    - `in_memory/`：内存存储实现（用于测试和演示）
//!    - `postgres/`：PostgreSQL 存储实现（生产环境使用）
//!
//! ## 两种数据形态
//!
//! - **原始采样**：(时间戳, 点位, 数值, 标签)，只追加；只按保留期或显式范围删除
//! - **每日聚合**：每个日历日期一行、24 个独立小时列，写入时只触碰一列
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use ems_storage::{InMemorySampleStore, SampleQuery, SampleStore};
//!
//! let store = InMemorySampleStore::new();
//! store.insert_samples(&samples).await?;
//! let history = store.query_samples(&SampleQuery::for_point("D430")).await?;
//! ```

// 模块导出：将子模块的内容导出到 crate 根目录
pub mod connection;
pub mod error;
pub mod in_memory;
pub mod postgres;
pub mod traits;
pub mod validation;

// 导出常用类型到 crate 根目录，方便外部引用
pub use connection::*;
pub use error::*;
pub use traits::*;
pub use validation::*;

pub use in_memory::{InMemoryDailyAggregateStore, InMemorySampleStore};
pub use postgres::{PgDailyAggregateStore, PgSampleStore, ensure_schema};
