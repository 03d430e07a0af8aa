//! 输入验证辅助函数
//!
//! - normalize_required：必填字段去除空格并检查非空
//! - parse_date：解析 YYYY-MM-DD
//! - parse_protocol_config：解析带 `protocol` 标签的协议配置
//! - device_key：路径参数 + 可选协议限定 → 设备键
//!
//! 失败统一返回 bad_request_error 响应。

use crate::utils::response::bad_request_error;
use axum::response::Response;
use chrono::NaiveDate;
use domain::{DeviceKey, ProtocolKind};
use ems_protocol::ProtocolConfig;
use serde_json::Value;

/// 验证必填字段，去除空格并检查非空
pub fn normalize_required(value: String, field: &str) -> Result<String, Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(trimmed.to_string())
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, Response> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| bad_request_error(format!("{field} must be YYYY-MM-DD")))
}

pub fn parse_protocol_config(value: Value) -> Result<ProtocolConfig, Response> {
    serde_json::from_value(value).map_err(|err| bad_request_error(format!("config invalid: {err}")))
}

/// 设备路由上的 `?protocol=` 限定
pub fn device_key(host: String, port: u16, protocol: Option<&str>) -> Result<DeviceKey, Response> {
    let host = normalize_required(host, "host")?;
    match protocol.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => match ProtocolKind::parse(value) {
            Some(kind) => Ok(DeviceKey::with_protocol(host, port, kind)),
            None => Err(bad_request_error(format!("unknown protocol: {value}"))),
        },
        None => Ok(DeviceKey::new(host, port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_key_with_qualifier() {
        let key = device_key(" 10.0.0.5 ".to_string(), 5000, Some("mc")).unwrap();
        assert_eq!(key.host, "10.0.0.5");
        assert_eq!(key.protocol, Some(ProtocolKind::Mc));
        assert!(device_key("10.0.0.5".to_string(), 5000, Some("opcua")).is_err());
        assert_eq!(
            device_key("10.0.0.5".to_string(), 502, Some("")).unwrap().protocol,
            None
        );
    }

    #[test]
    fn date_format_is_strict() {
        assert!(parse_date("2024-03-01", "date").is_ok());
        assert!(parse_date("2024/03/01", "date").is_err());
    }
}
