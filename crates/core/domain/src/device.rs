use serde::{Deserialize, Serialize};
use std::fmt;

/// 协议种类（封闭集合）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Modbus TCP
    Modbus,
    /// MELSEC MC 协议（3E 帧，二进制）
    Mc,
    /// 模拟驱动（演示用）
    Simulated,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modbus => "modbus",
            Self::Mc => "mc",
            Self::Simulated => "simulated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "modbus" | "modbus_tcp" => Some(Self::Modbus),
            "mc" | "melsec" => Some(Self::Mc),
            "simulated" | "demo" => Some(Self::Simulated),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 设备键：标识一条物理链路。
///
/// 同一个键在任意时刻最多对应一个存活的驱动实例。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolKind>,
}

impl DeviceKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: None,
        }
    }

    /// 带协议限定的设备键（同一 host:port 上跑不同协议时使用）。
    pub fn with_protocol(host: impl Into<String>, port: u16, protocol: ProtocolKind) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: Some(protocol),
        }
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Some(protocol) => write!(f, "{}:{}/{}", self.host, self.port, protocol),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}
