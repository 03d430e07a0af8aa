//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Modbus 异常响应
    #[error("modbus error: {0}")]
    Modbus(String),

    /// MC 协议异常结束码
    #[error("mc error: {0}")]
    Mc(String),

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// 数据解析错误
    #[error("data parse error: {0}")]
    DataParse(String),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),
}

impl ProtocolError {
    /// 传输层错误：链路不可用，驱动需丢弃连接并在下次调用时重连。
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Io(_) | Self::Timeout(_))
    }
}
