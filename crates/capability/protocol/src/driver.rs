//! 协议驱动接口与工厂
//!
//! 每个设备键对应一个驱动实例；驱动内部持有传输连接，
//! `read` / `write` 在未连接时会自动建立连接。

use crate::config::{DriverTimeouts, ProtocolConfig};
use crate::error::ProtocolError;
use crate::mc_protocol::McDriver;
use crate::modbus_tcp::ModbusTcpDriver;
use crate::simulated::SimulatedDriver;
use crate::types::ResolvedPoint;
use async_trait::async_trait;
use domain::{DeviceKey, ProtocolKind, ReadOutcome};
use std::future::Future;
use std::time::Duration;

/// 协议驱动能力集合
#[async_trait]
pub trait ProtocolDriver: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    fn is_connected(&self) -> bool;

    /// 建立传输连接（已连接时直接返回）
    async fn connect(&mut self) -> Result<(), ProtocolError>;

    /// 断开传输连接（未连接时无操作）
    async fn disconnect(&mut self);

    /// 逐点读取（每点一次往返）
    ///
    /// 单点被拒绝时记为 `PointReading::Unavailable`；
    /// 传输层失败时中止整次读取并返回错误。
    async fn read(&mut self, points: &[ResolvedPoint]) -> Result<ReadOutcome, ProtocolError>;

    /// 写单个寄存器 / 位
    async fn write(&mut self, point: &ResolvedPoint, value: f64) -> Result<(), ProtocolError>;
}

/// 驱动工厂：按协议配置创建驱动实例
pub trait DriverFactory: Send + Sync {
    fn create(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
    ) -> Result<Box<dyn ProtocolDriver>, ProtocolError>;
}

/// 标准驱动工厂（真实协议 + 模拟驱动）
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDriverFactory {
    timeouts: DriverTimeouts,
}

impl StandardDriverFactory {
    pub fn new(timeouts: DriverTimeouts) -> Self {
        Self { timeouts }
    }
}

impl DriverFactory for StandardDriverFactory {
    fn create(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
    ) -> Result<Box<dyn ProtocolDriver>, ProtocolError> {
        if key.host.trim().is_empty() {
            return Err(ProtocolError::ConfigParse("host is required".to_string()));
        }
        if let Some(protocol) = key.protocol {
            if protocol != config.kind() {
                return Err(ProtocolError::ConfigParse(format!(
                    "device key qualified as {} but config is {}",
                    protocol,
                    config.kind()
                )));
            }
        }
        let timeouts = config.timeouts(self.timeouts);
        let driver: Box<dyn ProtocolDriver> = match config {
            ProtocolConfig::Modbus(modbus) => {
                Box::new(ModbusTcpDriver::new(key.clone(), modbus.clone(), timeouts))
            }
            ProtocolConfig::Mc(mc) => Box::new(McDriver::new(key.clone(), mc.clone(), timeouts)),
            ProtocolConfig::Simulated(simulated) => Box::new(SimulatedDriver::new(simulated.clone())),
        };
        Ok(driver)
    }
}

/// 为网络操作加超时：超时后返回 `ProtocolError::Timeout`
pub async fn with_timeout<T, F>(duration: Duration, what: &str, fut: F) -> Result<T, ProtocolError>
where
    F: Future<Output = Result<T, ProtocolError>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(format!(
            "{} exceeded {}ms",
            what,
            duration.as_millis()
        ))),
    }
}
