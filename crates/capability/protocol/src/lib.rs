//! # 协议驱动能力模块
//!
//! 提供 PLC 点位读写能力，支持：
//! - **Modbus TCP**：保持/输入寄存器、线圈、离散输入
//! - **MC 3E 帧（二进制）**：D/W/R/ZR 字软元件与 M/X/Y/B/L 位软元件
//! - **模拟驱动**：无硬件时生成确定性波形
//!
//! ## 架构设计
//!
//! ```text
//! 设备注册 (DeviceKey + ProtocolConfig + 点位标识)
//!       │
//!       ▼
//! ProtocolConfig::resolve_points  ──►  ResolvedPoint（结构化地址）
//!       │
//!       ▼
//! DriverFactory::create
//!       │
//!       ├── ModbusTcpDriver
//!       ├── McDriver
//!       └── SimulatedDriver
//!       │
//!       ▼
//! ReadOutcome（逐点 Value / Unavailable）
//! ```
//!
//! ## 错误语义
//!
//! - 传输层失败（连接、IO、超时）：整次读取返回 `Err`，驱动丢弃连接
//! - 单点被设备拒绝（异常码、结束代码非零）：该点记为 `PointReading::Unavailable`

mod address;
mod config;
mod driver;
mod error;
pub mod mc_frame;
mod mc_protocol;
mod modbus_tcp;
mod simulated;
mod types;

pub use address::{parse_mc_address, parse_modbus_address, parse_simulated_address};
pub use config::{DriverTimeouts, McConfig, ModbusConfig, ProtocolConfig, SimulatedConfig};
pub use driver::{with_timeout, DriverFactory, ProtocolDriver, StandardDriverFactory};
pub use error::ProtocolError;
pub use mc_protocol::McDriver;
pub use modbus_tcp::ModbusTcpDriver;
pub use simulated::SimulatedDriver;
pub use types::*;
