//! 采集引擎错误类型

use ems_protocol::ProtocolError;
use ems_storage::StorageError;

/// 采集引擎错误。
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// 注册参数不合法，未启动任何任务
    #[error("validation error: {0}")]
    Validation(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AcquisitionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
