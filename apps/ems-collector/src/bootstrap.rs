//! 启动注册文件
//!
//! JSON 数组，每项是一个 `PollRegistration`：
//!
//! ```json
//! [
//!   {
//!     "key": {"host": "10.0.0.5", "port": 5000},
//!     "points": ["D430", "D432:2"],
//!     "interval_ms": 1000,
//!     "config": {"protocol": "mc"},
//!     "energy_point": "D432:2"
//!   }
//! ]
//! ```
//!
//! 文件不可读或格式错误时启动失败；单个设备注册失败只记录日志。

use ems_acquisition::{Engine, PollRegistration};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub registered: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub fn parse_registrations(json: &str) -> Result<Vec<PollRegistration>, serde_json::Error> {
    serde_json::from_str(json)
}

pub async fn apply_file(
    engine: &Engine,
    path: impl AsRef<Path>,
) -> Result<BootstrapReport, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await?;
    let registrations = parse_registrations(&content)?;
    let report = apply(engine, registrations).await;
    info!(
        target: "ems.collector",
        file = %path.display(),
        registered = report.registered,
        skipped = report.skipped,
        failed = report.failed,
        "bootstrap_applied"
    );
    Ok(report)
}

pub async fn apply(engine: &Engine, registrations: Vec<PollRegistration>) -> BootstrapReport {
    let mut report = BootstrapReport::default();
    for registration in registrations {
        let key = registration.key.clone();
        match engine.register_polling(registration).await {
            Ok(true) => report.registered += 1,
            Ok(false) => report.skipped += 1,
            Err(err) => {
                report.failed += 1;
                warn!(
                    target: "ems.collector",
                    device = %key,
                    error = %err,
                    "bootstrap_registration_failed"
                );
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_acquisition::EngineSettings;
    use ems_protocol::StandardDriverFactory;
    use ems_storage::{InMemoryDailyAggregateStore, InMemorySampleStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn applies_simulated_registrations() {
        let json = r#"[
            {"key": {"host": "demo", "port": 1}, "points": ["temp"], "interval_ms": 1000,
             "config": {"protocol": "simulated"}},
            {"key": {"host": "demo", "port": 1}, "points": ["other"], "interval_ms": 500,
             "config": {"protocol": "simulated"}},
            {"key": {"host": "demo", "port": 2}, "points": [], "interval_ms": 1000,
             "config": {"protocol": "simulated"}}
        ]"#;
        let registrations = parse_registrations(json).unwrap();
        let engine = Engine::new(
            Arc::new(StandardDriverFactory::default()),
            Arc::new(InMemorySampleStore::new()),
            Arc::new(InMemoryDailyAggregateStore::new()),
            EngineSettings::default(),
        );

        let report = apply(&engine, registrations).await;
        assert_eq!(
            report,
            BootstrapReport {
                registered: 1,
                skipped: 1,
                failed: 1,
            }
        );
        engine.shutdown().await;
    }
}
