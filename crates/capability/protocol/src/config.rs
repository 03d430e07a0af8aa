//! 设备协议配置
//!
//! 协议种类为封闭集合，注册时解析一次，之后不再按字符串分支。
//!
//! ```json
//! { "protocol": "modbus", "unit_id": 1, "address_offset": -1 }
//! { "protocol": "mc", "network_no": 0, "pc_no": 255 }
//! { "protocol": "simulated" }
//! ```

use crate::address::{parse_mc_address, parse_modbus_address, parse_simulated_address};
use crate::error::ProtocolError;
use crate::types::{PointAddress, ResolvedPoint};
use domain::ProtocolKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 设备协议配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum ProtocolConfig {
    Modbus(ModbusConfig),
    Mc(McConfig),
    Simulated(SimulatedConfig),
}

impl ProtocolConfig {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            Self::Modbus(_) => ProtocolKind::Modbus,
            Self::Mc(_) => ProtocolKind::Mc,
            Self::Simulated(_) => ProtocolKind::Simulated,
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::ConfigParse(e.to_string()))
    }

    /// 将文本点位标识解析为结构化地址
    pub fn resolve_point(&self, point: &str) -> Result<PointAddress, ProtocolError> {
        let point = point.trim();
        if point.is_empty() {
            return Err(ProtocolError::ConfigParse("empty point id".to_string()));
        }
        match self {
            Self::Modbus(config) => {
                parse_modbus_address(point, config.address_offset).map(PointAddress::Modbus)
            }
            Self::Mc(_) => parse_mc_address(point).map(PointAddress::Mc),
            Self::Simulated(_) => Ok(parse_simulated_address(point)),
        }
    }

    /// 批量解析，任一失败即返回错误
    pub fn resolve_points<S: AsRef<str>>(
        &self,
        points: &[S],
    ) -> Result<Vec<ResolvedPoint>, ProtocolError> {
        points
            .iter()
            .map(|point| {
                let id = point.as_ref().trim().to_string();
                self.resolve_point(&id)
                    .map(|address| ResolvedPoint { id, address })
            })
            .collect()
    }

    fn timeout_overrides(&self) -> (Option<u64>, Option<u64>) {
        match self {
            Self::Modbus(config) => (config.connect_timeout_ms, config.io_timeout_ms),
            Self::Mc(config) => (config.connect_timeout_ms, config.io_timeout_ms),
            Self::Simulated(_) => (None, None),
        }
    }

    /// 合并设备级超时覆盖与全局默认值
    pub fn timeouts(&self, defaults: DriverTimeouts) -> DriverTimeouts {
        let (connect, io) = self.timeout_overrides();
        DriverTimeouts {
            connect: connect.map(Duration::from_millis).unwrap_or(defaults.connect),
            io: io.map(Duration::from_millis).unwrap_or(defaults.io),
        }
    }
}

/// 驱动超时设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTimeouts {
    pub connect: Duration,
    /// 单次请求往返超时
    pub io: Duration,
}

impl Default for DriverTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(3000),
            io: Duration::from_millis(3000),
        }
    }
}

/// Modbus TCP 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// 从站 ID
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// 线性地址偏移：寄存器 = 点位编号 + 偏移
    ///
    /// 用于换算两种硬件系列的编址习惯（从 0 或从 1 开始）。
    #[serde(default)]
    pub address_offset: i32,
    pub connect_timeout_ms: Option<u64>,
    pub io_timeout_ms: Option<u64>,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            unit_id: default_unit_id(),
            address_offset: 0,
            connect_timeout_ms: None,
            io_timeout_ms: None,
        }
    }
}

fn default_unit_id() -> u8 {
    1
}

/// MC 协议（3E 帧，二进制）配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McConfig {
    /// 网络编号
    #[serde(default)]
    pub network_no: u8,
    /// 可编程控制器编号
    #[serde(default = "default_pc_no")]
    pub pc_no: u8,
    /// 请求目标模块 I/O 编号
    #[serde(default = "default_io_no")]
    pub io_no: u16,
    /// 请求目标模块站号
    #[serde(default)]
    pub station_no: u8,
    /// CPU 监视定时器（单位 250ms）
    #[serde(default = "default_monitoring_timer")]
    pub monitoring_timer: u16,
    pub connect_timeout_ms: Option<u64>,
    pub io_timeout_ms: Option<u64>,
}

impl Default for McConfig {
    fn default() -> Self {
        Self {
            network_no: 0,
            pc_no: default_pc_no(),
            io_no: default_io_no(),
            station_no: 0,
            monitoring_timer: default_monitoring_timer(),
            connect_timeout_ms: None,
            io_timeout_ms: None,
        }
    }
}

fn default_pc_no() -> u8 {
    0xFF
}

fn default_io_no() -> u16 {
    0x03FF
}

fn default_monitoring_timer() -> u16 {
    4
}

/// 模拟驱动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// 波形基准值
    #[serde(default = "default_base")]
    pub base: f64,
    /// 波形振幅
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            amplitude: default_amplitude(),
        }
    }
}

fn default_base() -> f64 {
    100.0
}

fn default_amplitude() -> f64 {
    10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{McDevice, RegisterTable};

    #[test]
    fn test_parse_modbus_config() {
        let config =
            ProtocolConfig::from_json(r#"{"protocol": "modbus", "address_offset": -1}"#).unwrap();
        assert_eq!(config.kind(), ProtocolKind::Modbus);
        match &config {
            ProtocolConfig::Modbus(modbus) => {
                assert_eq!(modbus.unit_id, 1);
                assert_eq!(modbus.address_offset, -1);
            }
            other => panic!("unexpected config: {:?}", other),
        }
        let address = config.resolve_point("40").unwrap();
        match address {
            PointAddress::Modbus(address) => {
                assert_eq!(address.table, RegisterTable::Holding);
                assert_eq!(address.register, 39);
            }
            other => panic!("unexpected address: {:?}", other),
        }
    }

    #[test]
    fn test_parse_mc_config_defaults() {
        let config = ProtocolConfig::from_json(r#"{"protocol": "mc"}"#).unwrap();
        match &config {
            ProtocolConfig::Mc(mc) => {
                assert_eq!(mc.pc_no, 0xFF);
                assert_eq!(mc.io_no, 0x03FF);
                assert_eq!(mc.monitoring_timer, 4);
            }
            other => panic!("unexpected config: {:?}", other),
        }
        let points = config.resolve_points(&["D430", " D432:2 "]).unwrap();
        assert_eq!(points[1].id, "D432:2");
        match &points[0].address {
            PointAddress::Mc(address) => {
                assert_eq!(address.device, McDevice::D);
                assert_eq!(address.head, 430);
                assert_eq!(address.count, 1);
            }
            other => panic!("unexpected address: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_rejects_empty_point() {
        let config = ProtocolConfig::Simulated(SimulatedConfig::default());
        assert!(config.resolve_point("  ").is_err());
        assert!(config.resolve_point("temperature").is_ok());
    }

    #[test]
    fn test_timeout_overrides() {
        let config = ProtocolConfig::Modbus(ModbusConfig {
            io_timeout_ms: Some(500),
            ..ModbusConfig::default()
        });
        let timeouts = config.timeouts(DriverTimeouts::default());
        assert_eq!(timeouts.io, Duration::from_millis(500));
        assert_eq!(timeouts.connect, Duration::from_millis(3000));
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        assert!(ProtocolConfig::from_json(r#"{"protocol": "bacnet"}"#).is_err());
    }
}
