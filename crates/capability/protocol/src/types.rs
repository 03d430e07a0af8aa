//! 结构化点位地址
//!
//! 点位标识在注册时解析一次，之后驱动只处理结构化地址。

use domain::PointId;
use serde::{Deserialize, Serialize};

/// Modbus 寄存器表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterTable {
    /// 保持寄存器（读 0x03 / 写 0x06）
    Holding,
    /// 输入寄存器（读 0x04，只读）
    Input,
    /// 线圈（读 0x01 / 写 0x05）
    Coil,
    /// 离散输入（读 0x02，只读）
    DiscreteInput,
}

impl RegisterTable {
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Holding | Self::Coil)
    }
}

/// Modbus 地址（已应用线性偏移）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModbusAddress {
    pub table: RegisterTable,
    pub register: u16,
}

/// MC 协议软元件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum McDevice {
    /// 数据寄存器
    D,
    /// 链接寄存器（十六进制编号）
    W,
    /// 文件寄存器
    R,
    /// 文件寄存器（连号访问）
    ZR,
    /// 内部继电器
    M,
    /// 输入（十六进制编号）
    X,
    /// 输出（十六进制编号）
    Y,
    /// 链接继电器（十六进制编号）
    B,
    /// 锁存继电器
    L,
}

impl McDevice {
    /// 二进制帧中的软元件代码
    pub fn code(&self) -> u8 {
        match self {
            Self::D => 0xA8,
            Self::W => 0xB4,
            Self::R => 0xAF,
            Self::ZR => 0xB0,
            Self::M => 0x90,
            Self::X => 0x9C,
            Self::Y => 0x9D,
            Self::B => 0xA0,
            Self::L => 0x92,
        }
    }

    pub fn is_bit(&self) -> bool {
        matches!(self, Self::M | Self::X | Self::Y | Self::B | Self::L)
    }

    /// 编号进制
    pub fn radix(&self) -> u32 {
        match self {
            Self::W | Self::X | Self::Y | Self::B => 16,
            _ => 10,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::D => "D",
            Self::W => "W",
            Self::R => "R",
            Self::ZR => "ZR",
            Self::M => "M",
            Self::X => "X",
            Self::Y => "Y",
            Self::B => "B",
            Self::L => "L",
        }
    }
}

/// MC 地址：软元件 + 起始编号 + 读取点数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct McAddress {
    pub device: McDevice,
    pub head: u32,
    /// 字软元件：1 = 16 位，2 = 32 位（低字在前）；位软元件固定为 1
    pub count: u16,
}

/// 结构化点位地址（携带协议、寄存器类别与数值偏移）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum PointAddress {
    Modbus(ModbusAddress),
    Mc(McAddress),
    Simulated { seed: u32 },
}

/// 已解析的点位：原始标识 + 结构化地址
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPoint {
    pub id: PointId,
    pub address: PointAddress,
}
