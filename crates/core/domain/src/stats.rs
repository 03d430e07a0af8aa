use serde::{Deserialize, Serialize};

/// 设备健康状态（由连续失败次数推导）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceHealth {
    Online,
    /// 已有失败，但未达到离线阈值
    Degraded,
    Offline,
}

/// 每个设备键的轮询统计。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollingStatistics {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    /// 返回值全部为 0 的次数
    pub zero_responses: u64,
    /// 上一次轮询超出周期而被跳过的 tick 数
    pub skipped_ticks: u64,
    pub last_success_ms: Option<i64>,
    pub last_failure_ms: Option<i64>,
    pub last_error: Option<String>,
}

impl PollingStatistics {
    pub fn record_success(&mut self, ts_ms: i64, all_zero: bool) {
        self.attempts += 1;
        self.successes += 1;
        self.consecutive_failures = 0;
        if all_zero {
            self.zero_responses += 1;
        }
        self.last_success_ms = Some(ts_ms);
    }

    pub fn record_failure(&mut self, ts_ms: i64, error: impl Into<String>) {
        self.attempts += 1;
        self.failures += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_ms = Some(ts_ms);
        self.last_error = Some(error.into());
    }

    pub fn record_skipped(&mut self, ticks: u64) {
        self.skipped_ticks += ticks;
    }

    pub fn health(&self, offline_after: u32) -> DeviceHealth {
        match self.consecutive_failures {
            0 => DeviceHealth::Online,
            n if n >= offline_after.max(1) => DeviceHealth::Offline,
            _ => DeviceHealth::Degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_consecutive_failures() {
        let mut stats = PollingStatistics::default();
        stats.record_failure(1, "timeout");
        stats.record_failure(2, "timeout");
        assert_eq!(stats.consecutive_failures, 2);
        assert_eq!(stats.health(3), DeviceHealth::Degraded);

        stats.record_failure(3, "timeout");
        assert_eq!(stats.health(3), DeviceHealth::Offline);

        stats.record_success(4, true);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.attempts, 4);
        assert_eq!(stats.failures, 3);
        assert_eq!(stats.zero_responses, 1);
        assert_eq!(stats.health(3), DeviceHealth::Online);
        assert_eq!(stats.last_error.as_deref(), Some("timeout"));
    }
}
