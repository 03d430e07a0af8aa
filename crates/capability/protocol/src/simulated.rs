//! 模拟驱动
//!
//! 无需硬件：按点位种子生成确定性的正弦波形，写入值会覆盖后续读取。

use crate::config::SimulatedConfig;
use crate::driver::ProtocolDriver;
use crate::error::ProtocolError;
use crate::types::{PointAddress, ResolvedPoint};
use async_trait::async_trait;
use domain::{now_epoch_ms, PointId, PointReading, ProtocolKind, ReadOutcome};
use std::collections::HashMap;

/// 波形周期（毫秒）
const PERIOD_MS: f64 = 60_000.0;

pub struct SimulatedDriver {
    config: SimulatedConfig,
    connected: bool,
    overrides: HashMap<PointId, f64>,
}

impl SimulatedDriver {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            connected: false,
            overrides: HashMap::new(),
        }
    }

    /// 指定时刻的波形值
    pub fn sample(&self, seed: u32, ts_ms: i64) -> f64 {
        let phase = f64::from(seed % 360).to_radians();
        let angle = (ts_ms as f64 / PERIOD_MS) * std::f64::consts::TAU + phase;
        let value = self.config.base + self.config.amplitude * angle.sin();
        (value * 100.0).round() / 100.0
    }
}

#[async_trait]
impl ProtocolDriver for SimulatedDriver {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Simulated
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn read(&mut self, points: &[ResolvedPoint]) -> Result<ReadOutcome, ProtocolError> {
        self.connected = true;
        let ts_ms = now_epoch_ms();
        let outcome = points
            .iter()
            .map(|point| {
                let reading = match (&point.address, self.overrides.get(&point.id)) {
                    (_, Some(value)) => PointReading::Value(*value),
                    (PointAddress::Simulated { seed }, None) => {
                        PointReading::Value(self.sample(*seed, ts_ms))
                    }
                    _ => PointReading::Unavailable("address is not a simulated address".to_string()),
                };
                (point.id.clone(), reading)
            })
            .collect();
        Ok(outcome)
    }

    async fn write(&mut self, point: &ResolvedPoint, value: f64) -> Result<(), ProtocolError> {
        if !value.is_finite() {
            return Err(ProtocolError::DataParse(format!("invalid value: {}", value)));
        }
        self.overrides.insert(point.id.clone(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;

    #[tokio::test]
    async fn test_values_stay_within_amplitude() {
        let mut driver = SimulatedDriver::new(SimulatedConfig::default());
        let config = ProtocolConfig::Simulated(SimulatedConfig::default());
        let points = config.resolve_points(&["temp", "flow"]).unwrap();

        let outcome = driver.read(&points).await.unwrap();
        assert!(driver.is_connected());
        for reading in outcome.values() {
            let value = reading.value().unwrap();
            assert!((90.0..=110.0).contains(&value));
        }
    }

    #[test]
    fn test_sample_is_deterministic() {
        let driver = SimulatedDriver::new(SimulatedConfig::default());
        assert_eq!(driver.sample(7, 1_000), driver.sample(7, 1_000));
        assert_eq!(driver.sample(0, 0), 100.0);
    }

    #[tokio::test]
    async fn test_write_overrides_reads() {
        let mut driver = SimulatedDriver::new(SimulatedConfig::default());
        let config = ProtocolConfig::Simulated(SimulatedConfig::default());
        let points = config.resolve_points(&["setpoint"]).unwrap();

        driver.write(&points[0], 42.5).await.unwrap();
        let outcome = driver.read(&points).await.unwrap();
        assert_eq!(outcome["setpoint"], PointReading::Value(42.5));
    }
}
