//! Modbus TCP 驱动实现
//!
//! 每个点位一次往返（不做连续地址合并）。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let config = ModbusConfig { unit_id: 1, address_offset: 0, ..Default::default() };
//! let mut driver = ModbusTcpDriver::new(DeviceKey::new("10.0.0.5", 502), config, timeouts);
//! let points = ProtocolConfig::Modbus(config).resolve_points(&["50", "51"])?;
//! let values = driver.read(&points).await?;
//! ```

use crate::config::{DriverTimeouts, ModbusConfig};
use crate::driver::{with_timeout, ProtocolDriver};
use crate::error::ProtocolError;
use crate::types::{ModbusAddress, PointAddress, RegisterTable, ResolvedPoint};
use async_trait::async_trait;
use domain::{DeviceKey, PointReading, ProtocolKind, ReadOutcome};
use std::net::SocketAddr;
use tokio::sync::Mutex;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// Modbus TCP 驱动
///
/// `Context` 内部是 `Box<dyn Client>`（只有 Send），放进 `Mutex` 后驱动才满足
/// `ProtocolDriver: Sync`；所有调用都持有 `&mut self`，经 `get_mut` 取用，不产生锁竞争。
pub struct ModbusTcpDriver {
    key: DeviceKey,
    config: ModbusConfig,
    timeouts: DriverTimeouts,
    ctx: Option<Mutex<Context>>,
}

impl ModbusTcpDriver {
    pub fn new(key: DeviceKey, config: ModbusConfig, timeouts: DriverTimeouts) -> Self {
        Self {
            key,
            config,
            timeouts,
            ctx: None,
        }
    }

    async fn resolve_addr(&self) -> Result<SocketAddr, ProtocolError> {
        let target = self.key.socket_addr();
        let mut addrs = tokio::net::lookup_host(target.as_str())
            .await
            .map_err(|e| ProtocolError::Connection(format!("resolve {}: {}", target, e)))?;
        let addr = addrs.next();
        addr.ok_or_else(|| ProtocolError::Connection(format!("no address for {}", target)))
    }

    fn context(&mut self) -> Result<&mut Context, ProtocolError> {
        self.ctx
            .as_mut()
            .map(Mutex::get_mut)
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))
    }

    /// 传输层失败后丢弃连接，下次调用重新建立
    fn drop_on_transport_error(&mut self, err: &ProtocolError) {
        if err.is_transport() {
            warn!(
                target: "ems.protocol",
                device = %self.key,
                error = %err,
                "modbus_transport_failed"
            );
            self.ctx = None;
        }
    }
}

#[async_trait]
impl ProtocolDriver for ModbusTcpDriver {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Modbus
    }

    fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.ctx.is_some() {
            return Ok(());
        }
        let addr = self.resolve_addr().await?;
        let slave = Slave(self.config.unit_id);
        let ctx = with_timeout(self.timeouts.connect, "modbus connect", async {
            tcp::connect_slave(addr, slave)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))
        })
        .await?;
        info!(
            target: "ems.protocol",
            device = %self.key,
            unit_id = self.config.unit_id,
            "modbus_connected"
        );
        self.ctx = Some(Mutex::new(ctx));
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            let _ = ctx.into_inner().disconnect().await;
            info!(target: "ems.protocol", device = %self.key, "modbus_disconnected");
        }
    }

    async fn read(&mut self, points: &[ResolvedPoint]) -> Result<ReadOutcome, ProtocolError> {
        self.connect().await?;
        let io_timeout = self.timeouts.io;
        let mut outcome = ReadOutcome::new();

        for point in points {
            let PointAddress::Modbus(address) = &point.address else {
                outcome.insert(
                    point.id.clone(),
                    PointReading::Unavailable("address is not a modbus address".to_string()),
                );
                continue;
            };
            let result = {
                let ctx = self.context()?;
                with_timeout(io_timeout, "modbus read", read_address(ctx, *address)).await
            };
            match result {
                Ok(value) => {
                    debug!(
                        target: "ems.protocol",
                        point = %point.id,
                        register = address.register,
                        value = value,
                        "modbus_point_read"
                    );
                    outcome.insert(point.id.clone(), PointReading::Value(value));
                }
                Err(err) if err.is_transport() => {
                    self.drop_on_transport_error(&err);
                    return Err(err);
                }
                Err(err) => {
                    outcome.insert(point.id.clone(), PointReading::Unavailable(err.to_string()));
                }
            }
        }

        Ok(outcome)
    }

    async fn write(&mut self, point: &ResolvedPoint, value: f64) -> Result<(), ProtocolError> {
        let PointAddress::Modbus(address) = &point.address else {
            return Err(ProtocolError::ConfigParse(format!(
                "{} is not a modbus address",
                point.id
            )));
        };
        if !address.table.is_writable() {
            return Err(ProtocolError::ConfigParse(format!(
                "{} is read-only",
                point.id
            )));
        }
        self.connect().await?;
        let io_timeout = self.timeouts.io;
        let result = {
            let ctx = self.context()?;
            with_timeout(io_timeout, "modbus write", write_address(ctx, *address, value)).await
        };
        if let Err(err) = &result {
            self.drop_on_transport_error(err);
        }
        result
    }
}

async fn read_address(ctx: &mut Context, address: ModbusAddress) -> Result<f64, ProtocolError> {
    let register = address.register;
    let value = match address.table {
        RegisterTable::Holding => {
            let words = ctx
                .read_holding_registers(register, 1)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))?
                .map_err(|e| ProtocolError::Modbus(format!("exception: {:?}", e)))?;
            first_word(&words)?
        }
        RegisterTable::Input => {
            let words = ctx
                .read_input_registers(register, 1)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))?
                .map_err(|e| ProtocolError::Modbus(format!("exception: {:?}", e)))?;
            first_word(&words)?
        }
        RegisterTable::Coil => {
            let bits = ctx
                .read_coils(register, 1)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))?
                .map_err(|e| ProtocolError::Modbus(format!("exception: {:?}", e)))?;
            first_bit(&bits)?
        }
        RegisterTable::DiscreteInput => {
            let bits = ctx
                .read_discrete_inputs(register, 1)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))?
                .map_err(|e| ProtocolError::Modbus(format!("exception: {:?}", e)))?;
            first_bit(&bits)?
        }
    };
    Ok(value)
}

async fn write_address(
    ctx: &mut Context,
    address: ModbusAddress,
    value: f64,
) -> Result<(), ProtocolError> {
    match address.table {
        RegisterTable::Holding => {
            let word = encode_word(value)?;
            ctx.write_single_register(address.register, word)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))?
                .map_err(|e| ProtocolError::Modbus(format!("exception: {:?}", e)))?;
        }
        RegisterTable::Coil => {
            ctx.write_single_coil(address.register, value != 0.0)
                .await
                .map_err(|e| ProtocolError::Connection(e.to_string()))?
                .map_err(|e| ProtocolError::Modbus(format!("exception: {:?}", e)))?;
        }
        RegisterTable::Input | RegisterTable::DiscreteInput => {
            return Err(ProtocolError::ConfigParse("register is read-only".to_string()));
        }
    }
    Ok(())
}

fn first_word(words: &[u16]) -> Result<f64, ProtocolError> {
    words
        .first()
        .map(|word| f64::from(*word))
        .ok_or_else(|| ProtocolError::DataParse("empty registers".to_string()))
}

fn first_bit(bits: &[bool]) -> Result<f64, ProtocolError> {
    bits.first()
        .map(|bit| if *bit { 1.0 } else { 0.0 })
        .ok_or_else(|| ProtocolError::DataParse("empty coils".to_string()))
}

/// 将数值编码为单个寄存器：接受 i16 与 u16 的并集范围
pub(crate) fn encode_word(value: f64) -> Result<u16, ProtocolError> {
    if !value.is_finite() {
        return Err(ProtocolError::DataParse(format!("invalid value: {}", value)));
    }
    let rounded = value.round();
    if rounded < f64::from(i16::MIN) || rounded > f64::from(u16::MAX) {
        return Err(ProtocolError::DataParse(format!(
            "value out of register range: {}",
            value
        )));
    }
    if rounded < 0.0 {
        Ok(rounded as i16 as u16)
    } else {
        Ok(rounded as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::driver::{DriverFactory, StandardDriverFactory};

    #[test]
    fn test_encode_word_range() {
        assert_eq!(encode_word(256.0).unwrap(), 256);
        assert_eq!(encode_word(65535.0).unwrap(), 65535);
        assert_eq!(encode_word(-1.0).unwrap(), 0xFFFF);
        assert_eq!(encode_word(12.6).unwrap(), 13);
        assert!(encode_word(70000.0).is_err());
        assert!(encode_word(-40000.0).is_err());
        assert!(encode_word(f64::NAN).is_err());
    }

    #[test]
    fn test_first_word_and_bit() {
        assert_eq!(first_word(&[255]).unwrap(), 255.0);
        assert!(first_word(&[]).is_err());
        assert_eq!(first_bit(&[true]).unwrap(), 1.0);
        assert_eq!(first_bit(&[false]).unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        // 绑定后立即释放端口，连接必然被拒绝
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut driver = ModbusTcpDriver::new(
            DeviceKey::new("127.0.0.1", port),
            ModbusConfig::default(),
            DriverTimeouts::default(),
        );
        let err = driver.connect().await.unwrap_err();
        assert!(err.is_transport());
        assert!(!driver.is_connected());
    }

    fn assert_send_sync<T: Send + Sync + ?Sized>(_: &T) {}

    #[test]
    fn test_factory_driver_is_send_sync() {
        let driver = StandardDriverFactory::default()
            .create(
                &DeviceKey::new("127.0.0.1", 502),
                &ProtocolConfig::Modbus(ModbusConfig::default()),
            )
            .unwrap();
        assert_send_sync(driver.as_ref());
        let concrete = ModbusTcpDriver::new(
            DeviceKey::new("127.0.0.1", 502),
            ModbusConfig::default(),
            DriverTimeouts::default(),
        );
        assert_send_sync(&concrete);
    }

    #[tokio::test]
    async fn test_write_rejects_read_only_table() {
        let mut driver = ModbusTcpDriver::new(
            DeviceKey::new("127.0.0.1", 1),
            ModbusConfig::default(),
            DriverTimeouts::default(),
        );
        let point = ResolvedPoint {
            id: "IR10".to_string(),
            address: PointAddress::Modbus(ModbusAddress {
                table: RegisterTable::Input,
                register: 10,
            }),
        };
        let err = driver.write(&point, 1.0).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConfigParse(_)));
    }
}
