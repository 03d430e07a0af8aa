//! MC 协议 3E 帧（二进制）编解码
//!
//! 请求帧：
//!
//! ```text
//! 50 00 | 网络号 | PC号 | I/O号(2, LE) | 站号 | 请求数据长(2, LE) | 监视定时器(2, LE)
//!       | 指令(2, LE) | 子指令(2, LE) | 起始编号(3, LE) | 软元件代码 | 点数(2, LE) | 写入数据
//! ```
//!
//! 响应帧：
//!
//! ```text
//! D0 00 | 网络号 | PC号 | I/O号(2) | 站号 | 响应数据长(2, LE) | 结束代码(2, LE) | 数据
//! ```
//!
//! 本模块只做字节层面的转换，不涉及 IO。

use crate::config::McConfig;
use crate::error::ProtocolError;
use crate::types::McAddress;

pub const REQUEST_SUBHEADER: [u8; 2] = [0x50, 0x00];
pub const RESPONSE_SUBHEADER: [u8; 2] = [0xD0, 0x00];
/// 响应帧固定头长度（含响应数据长字段）
pub const RESPONSE_HEADER_LEN: usize = 9;

const CMD_BATCH_READ: u16 = 0x0401;
const CMD_BATCH_WRITE: u16 = 0x1401;
const SUB_WORD: u16 = 0x0000;
const SUB_BIT: u16 = 0x0001;

/// 帧路由字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McHeader {
    pub network_no: u8,
    pub pc_no: u8,
    pub io_no: u16,
    pub station_no: u8,
    pub monitoring_timer: u16,
}

impl From<&McConfig> for McHeader {
    fn from(config: &McConfig) -> Self {
        Self {
            network_no: config.network_no,
            pc_no: config.pc_no,
            io_no: config.io_no,
            station_no: config.station_no,
            monitoring_timer: config.monitoring_timer,
        }
    }
}

/// 批量读请求
pub fn encode_read_request(header: &McHeader, address: &McAddress) -> Vec<u8> {
    let sub = if address.device.is_bit() { SUB_BIT } else { SUB_WORD };
    encode_request(header, CMD_BATCH_READ, sub, address, &[])
}

/// 批量写请求：字软元件写入 `count` 个字，位软元件写入单个位
pub fn encode_write_request(
    header: &McHeader,
    address: &McAddress,
    value: f64,
) -> Result<Vec<u8>, ProtocolError> {
    if address.device.is_bit() {
        // 位数据按半字节打包，首点位于高半字节
        let payload = [if value != 0.0 { 0x10 } else { 0x00 }];
        return Ok(encode_request(
            header,
            CMD_BATCH_WRITE,
            SUB_BIT,
            address,
            &payload,
        ));
    }
    let payload = encode_words(value, address.count)?;
    Ok(encode_request(
        header,
        CMD_BATCH_WRITE,
        SUB_WORD,
        address,
        &payload,
    ))
}

fn encode_request(
    header: &McHeader,
    command: u16,
    subcommand: u16,
    address: &McAddress,
    payload: &[u8],
) -> Vec<u8> {
    // 监视定时器 2 + 指令 2 + 子指令 2 + 起始编号 3 + 代码 1 + 点数 2
    let data_len = (12 + payload.len()) as u16;
    let mut frame = Vec::with_capacity(9 + data_len as usize);
    frame.extend_from_slice(&REQUEST_SUBHEADER);
    frame.push(header.network_no);
    frame.push(header.pc_no);
    frame.extend_from_slice(&header.io_no.to_le_bytes());
    frame.push(header.station_no);
    frame.extend_from_slice(&data_len.to_le_bytes());
    frame.extend_from_slice(&header.monitoring_timer.to_le_bytes());
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(&subcommand.to_le_bytes());
    frame.extend_from_slice(&address.head.to_le_bytes()[..3]);
    frame.push(address.device.code());
    frame.extend_from_slice(&address.count.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// 解析固定头，返回其后剩余字节数（结束代码 + 数据）
pub fn decode_response_header(header: &[u8]) -> Result<usize, ProtocolError> {
    if header.len() < RESPONSE_HEADER_LEN {
        return Err(ProtocolError::DataParse(format!(
            "mc response header too short: {} bytes",
            header.len()
        )));
    }
    if header[..2] != RESPONSE_SUBHEADER {
        return Err(ProtocolError::DataParse(format!(
            "unexpected mc subheader: {:02X} {:02X}",
            header[0], header[1]
        )));
    }
    let remaining = u16::from_le_bytes([header[7], header[8]]) as usize;
    if remaining < 2 {
        return Err(ProtocolError::DataParse(format!(
            "mc response length too small: {}",
            remaining
        )));
    }
    Ok(remaining)
}

/// 解析响应体（结束代码 + 数据），结束代码非零时返回 `ProtocolError::Mc`
pub fn decode_response_body(body: &[u8]) -> Result<&[u8], ProtocolError> {
    if body.len() < 2 {
        return Err(ProtocolError::DataParse("mc response missing end code".to_string()));
    }
    let end_code = u16::from_le_bytes([body[0], body[1]]);
    if end_code != 0 {
        return Err(ProtocolError::Mc(format!("end code 0x{:04X}", end_code)));
    }
    Ok(&body[2..])
}

/// 读取结果转数值：字软元件 1 字 = u16，2 字 = u32（低字在前）；位软元件取首个半字节
pub fn decode_value(address: &McAddress, data: &[u8]) -> Result<f64, ProtocolError> {
    if address.device.is_bit() {
        let byte = data
            .first()
            .ok_or_else(|| ProtocolError::DataParse("empty mc bit data".to_string()))?;
        return Ok(if byte & 0x10 != 0 { 1.0 } else { 0.0 });
    }
    match address.count {
        1 => {
            if data.len() < 2 {
                return Err(ProtocolError::DataParse(format!(
                    "mc word data too short: {} bytes",
                    data.len()
                )));
            }
            Ok(f64::from(u16::from_le_bytes([data[0], data[1]])))
        }
        2 => {
            if data.len() < 4 {
                return Err(ProtocolError::DataParse(format!(
                    "mc dword data too short: {} bytes",
                    data.len()
                )));
            }
            let low = u32::from(u16::from_le_bytes([data[0], data[1]]));
            let high = u32::from(u16::from_le_bytes([data[2], data[3]]));
            Ok(f64::from((high << 16) | low))
        }
        other => Err(ProtocolError::DataParse(format!(
            "unsupported mc word count: {}",
            other
        ))),
    }
}

fn encode_words(value: f64, count: u16) -> Result<Vec<u8>, ProtocolError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProtocolError::DataParse(format!("invalid value: {}", value)));
    }
    let rounded = value.round();
    match count {
        1 => {
            if rounded > f64::from(u16::MAX) {
                return Err(ProtocolError::DataParse(format!(
                    "value out of word range: {}",
                    value
                )));
            }
            Ok((rounded as u16).to_le_bytes().to_vec())
        }
        2 => {
            if rounded > f64::from(u32::MAX) {
                return Err(ProtocolError::DataParse(format!(
                    "value out of dword range: {}",
                    value
                )));
            }
            let raw = rounded as u32;
            let mut bytes = ((raw & 0xFFFF) as u16).to_le_bytes().to_vec();
            bytes.extend_from_slice(&((raw >> 16) as u16).to_le_bytes());
            Ok(bytes)
        }
        other => Err(ProtocolError::DataParse(format!(
            "unsupported mc word count: {}",
            other
        ))),
    }
}

/// 构造响应帧（用于测试桩服务端）
pub fn encode_response(header: &McHeader, end_code: u16, data: &[u8]) -> Vec<u8> {
    let len = (2 + data.len()) as u16;
    let mut frame = Vec::with_capacity(RESPONSE_HEADER_LEN + len as usize);
    frame.extend_from_slice(&RESPONSE_SUBHEADER);
    frame.push(header.network_no);
    frame.push(header.pc_no);
    frame.extend_from_slice(&header.io_no.to_le_bytes());
    frame.push(header.station_no);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&end_code.to_le_bytes());
    frame.extend_from_slice(data);
    frame
}
