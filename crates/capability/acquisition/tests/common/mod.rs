#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use domain::{DailyAggregateRow, DeviceKey, PointReading, ProtocolKind, RawSample, ReadOutcome};
use ems_acquisition::{Engine, EngineSettings, PollRegistration};
use ems_protocol::{
    DriverFactory, ModbusConfig, ProtocolConfig, ProtocolDriver, ProtocolError, ResolvedPoint,
};
use ems_storage::{
    DailyAggregateStore, InMemoryDailyAggregateStore, InMemorySampleStore, SampleQuery,
    SampleStore, StorageError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 单台模拟设备的脚本状态
#[derive(Default)]
pub struct Script {
    values: Mutex<BTreeMap<String, f64>>,
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub reads: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub writes: Mutex<Vec<(String, f64)>>,
}

impl Script {
    pub fn set(&self, point: &str, value: f64) {
        self.values
            .lock()
            .unwrap()
            .insert(point.to_string(), value);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// 按主机名分配脚本的驱动工厂
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: Mutex<HashMap<String, Arc<Script>>>,
    pub created: AtomicUsize,
}

impl ScriptedFactory {
    pub fn script(&self, host: &str) -> Arc<Script> {
        self.scripts
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl DriverFactory for ScriptedFactory {
    fn create(
        &self,
        key: &DeviceKey,
        config: &ProtocolConfig,
    ) -> Result<Box<dyn ProtocolDriver>, ProtocolError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedDriver {
            kind: config.kind(),
            script: self.script(&key.host),
            connected: false,
        }))
    }
}

struct ScriptedDriver {
    kind: ProtocolKind,
    script: Arc<Script>,
    connected: bool,
}

#[async_trait]
impl ProtocolDriver for ScriptedDriver {
    fn kind(&self) -> ProtocolKind {
        self.kind
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.script.offline.load(Ordering::SeqCst) {
            return Err(ProtocolError::Connection("host unreachable".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn read(&mut self, points: &[ResolvedPoint]) -> Result<ReadOutcome, ProtocolError> {
        let in_flight = self.script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.script
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        self.script.reads.fetch_add(1, Ordering::SeqCst);

        let delay = *self.script.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let result = match self.connect().await {
            Ok(()) => {
                let values = self.script.values.lock().unwrap();
                Ok(points
                    .iter()
                    .map(|point| {
                        let reading = values
                            .get(&point.id)
                            .map(|value| PointReading::Value(*value))
                            .unwrap_or_else(|| {
                                PointReading::Unavailable("illegal data address".to_string())
                            });
                        (point.id.clone(), reading)
                    })
                    .collect())
            }
            Err(err) => {
                self.connected = false;
                Err(err)
            }
        };
        self.script.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn write(&mut self, point: &ResolvedPoint, value: f64) -> Result<(), ProtocolError> {
        self.connect().await?;
        self.script
            .writes
            .lock()
            .unwrap()
            .push((point.id.clone(), value));
        self.script.set(&point.id, value);
        Ok(())
    }
}

/// 始终失败的存储
pub struct BrokenStore;

#[async_trait]
impl SampleStore for BrokenStore {
    async fn insert_samples(&self, _samples: &[RawSample]) -> Result<usize, StorageError> {
        Err(StorageError::new("connection refused"))
    }

    async fn query_samples(&self, _query: &SampleQuery) -> Result<Vec<RawSample>, StorageError> {
        Err(StorageError::new("connection refused"))
    }

    async fn delete_samples(
        &self,
        _from_ms: i64,
        _to_ms: i64,
        _point_id: Option<&str>,
    ) -> Result<u64, StorageError> {
        Err(StorageError::new("connection refused"))
    }

    async fn delete_samples_before(&self, _cutoff_ms: i64) -> Result<u64, StorageError> {
        Err(StorageError::new("connection refused"))
    }
}

#[async_trait]
impl DailyAggregateStore for BrokenStore {
    async fn get_day(&self, _date: NaiveDate) -> Result<Option<DailyAggregateRow>, StorageError> {
        Err(StorageError::new("connection refused"))
    }

    async fn get_days(
        &self,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<DailyAggregateRow>, StorageError> {
        Err(StorageError::new("connection refused"))
    }

    async fn upsert_hour(
        &self,
        _date: NaiveDate,
        _hour: usize,
        _value: f64,
        _updated_at_ms: i64,
    ) -> Result<(), StorageError> {
        Err(StorageError::new("connection refused"))
    }

    async fn delete_days(&self, _from: NaiveDate, _to: NaiveDate) -> Result<u64, StorageError> {
        Err(StorageError::new("connection refused"))
    }
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub factory: Arc<ScriptedFactory>,
    pub samples: Arc<InMemorySampleStore>,
    pub daily: Arc<InMemoryDailyAggregateStore>,
}

pub fn harness() -> Harness {
    let factory = Arc::new(ScriptedFactory::default());
    let samples = Arc::new(InMemorySampleStore::new());
    let daily = Arc::new(InMemoryDailyAggregateStore::new());
    let engine = Arc::new(Engine::new(
        factory.clone(),
        samples.clone(),
        daily.clone(),
        EngineSettings::default(),
    ));
    Harness {
        engine,
        factory,
        samples,
        daily,
    }
}

pub fn broken_engine(factory: Arc<ScriptedFactory>) -> Engine {
    Engine::new(
        factory,
        Arc::new(BrokenStore),
        Arc::new(BrokenStore),
        EngineSettings::default(),
    )
}

pub fn modbus_registration(host: &str, points: &[&str], interval_ms: u64) -> PollRegistration {
    PollRegistration::new(
        DeviceKey::new(host, 502),
        points.iter().map(|point| point.to_string()).collect(),
        interval_ms,
        ProtocolConfig::Modbus(ModbusConfig::default()),
    )
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("date")
}
