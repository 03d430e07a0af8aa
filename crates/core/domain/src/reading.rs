use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 点位标识（配置中的原始文本，如 "D430"、"50"）。
pub type PointId = String;

/// 单点读取结果。
///
/// 读取失败显式标记为 `Unavailable`，不会折叠为 0。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum PointReading {
    Value(f64),
    Unavailable(String),
}

impl PointReading {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(*value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// 一次读取的全部点位结果（按点位标识排序）。
pub type ReadOutcome = BTreeMap<PointId, PointReading>;

/// 设备最新快照。每个 tick 覆盖，不做历史化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub values: ReadOutcome,
    pub last_update_ms: i64,
    pub error: Option<String>,
    pub connected: bool,
}

impl Snapshot {
    pub fn success(values: ReadOutcome, ts_ms: i64) -> Self {
        Self {
            values,
            last_update_ms: ts_ms,
            error: None,
            connected: true,
        }
    }

    /// 成功读取到的数值（不可用点位被跳过）。
    pub fn available_values(&self) -> BTreeMap<PointId, f64> {
        self.values
            .iter()
            .filter_map(|(point, reading)| reading.value().map(|value| (point.clone(), value)))
            .collect()
    }
}

/// 所有点位都不可用（或结果为空）。
pub fn all_unavailable(outcome: &ReadOutcome) -> bool {
    outcome.values().all(|reading| !reading.is_available())
}

/// 至少一个点可用，且所有可用点位都为 0。
///
/// 常见于设备静默断开但传输层仍然返回成功的情况。
pub fn all_zero(outcome: &ReadOutcome) -> bool {
    let mut available = outcome.values().filter_map(PointReading::value).peekable();
    if available.peek().is_none() {
        return false;
    }
    available.all(|value| value == 0.0)
}
