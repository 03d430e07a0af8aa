//! MC 协议（3E 帧，二进制）驱动
//!
//! 每个点位一次请求/响应往返；帧编解码见 [`crate::mc_frame`]。

use crate::config::{DriverTimeouts, McConfig};
use crate::driver::{with_timeout, ProtocolDriver};
use crate::error::ProtocolError;
use crate::mc_frame::{self, McHeader, RESPONSE_HEADER_LEN};
use crate::types::{McAddress, PointAddress, ResolvedPoint};
use async_trait::async_trait;
use domain::{DeviceKey, PointReading, ProtocolKind, ReadOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// MC 3E 驱动
pub struct McDriver {
    key: DeviceKey,
    header: McHeader,
    timeouts: DriverTimeouts,
    stream: Option<TcpStream>,
}

impl McDriver {
    pub fn new(key: DeviceKey, config: McConfig, timeouts: DriverTimeouts) -> Self {
        Self {
            key,
            header: McHeader::from(&config),
            timeouts,
            stream: None,
        }
    }

    /// 发送请求并读取完整响应，返回结束代码之后的数据
    async fn exchange(&mut self, request: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
        let io_timeout = self.timeouts.io;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;

        let body = with_timeout(io_timeout, "mc exchange", async {
            stream.write_all(&request).await?;
            let mut header = [0u8; RESPONSE_HEADER_LEN];
            stream.read_exact(&mut header).await?;
            // 帧头错位说明字节流已不可信，按链路故障处理
            let remaining = mc_frame::decode_response_header(&header)
                .map_err(|e| ProtocolError::Connection(e.to_string()))?;
            let mut body = vec![0u8; remaining];
            stream.read_exact(&mut body).await?;
            Ok(body)
        })
        .await;

        match body {
            Ok(body) => mc_frame::decode_response_body(&body).map(|data| data.to_vec()),
            Err(err) => {
                if err.is_transport() {
                    warn!(
                        target: "ems.protocol",
                        device = %self.key,
                        error = %err,
                        "mc_transport_failed"
                    );
                    self.stream = None;
                }
                Err(err)
            }
        }
    }

    async fn read_address(&mut self, address: &McAddress) -> Result<f64, ProtocolError> {
        let request = mc_frame::encode_read_request(&self.header, address);
        let data = self.exchange(request).await?;
        mc_frame::decode_value(address, &data)
    }
}

#[async_trait]
impl ProtocolDriver for McDriver {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Mc
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let target = self.key.socket_addr();
        let stream = with_timeout(self.timeouts.connect, "mc connect", async {
            TcpStream::connect(&target)
                .await
                .map_err(|e| ProtocolError::Connection(format!("{}: {}", target, e)))
        })
        .await?;
        let _ = stream.set_nodelay(true);
        info!(target: "ems.protocol", device = %self.key, "mc_connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            info!(target: "ems.protocol", device = %self.key, "mc_disconnected");
        }
    }

    async fn read(&mut self, points: &[ResolvedPoint]) -> Result<ReadOutcome, ProtocolError> {
        self.connect().await?;
        let mut outcome = ReadOutcome::new();

        for point in points {
            let PointAddress::Mc(address) = &point.address else {
                outcome.insert(
                    point.id.clone(),
                    PointReading::Unavailable("address is not an mc address".to_string()),
                );
                continue;
            };
            match self.read_address(address).await {
                Ok(value) => {
                    debug!(
                        target: "ems.protocol",
                        point = %point.id,
                        value = value,
                        "mc_point_read"
                    );
                    outcome.insert(point.id.clone(), PointReading::Value(value));
                }
                Err(err) if err.is_transport() => return Err(err),
                Err(err) => {
                    outcome.insert(point.id.clone(), PointReading::Unavailable(err.to_string()));
                }
            }
        }

        Ok(outcome)
    }

    async fn write(&mut self, point: &ResolvedPoint, value: f64) -> Result<(), ProtocolError> {
        let PointAddress::Mc(address) = &point.address else {
            return Err(ProtocolError::ConfigParse(format!(
                "{} is not an mc address",
                point.id
            )));
        };
        let request = mc_frame::encode_write_request(&self.header, address, value)?;
        self.connect().await?;
        self.exchange(request).await?;
        Ok(())
    }
}
