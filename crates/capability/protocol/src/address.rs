//! 点位地址解析
//!
//! 将文本点位标识转换为结构化地址：
//!
//! - **MC**：`"D430"` → D 寄存器 430，隐含读取 1 点；`"D430:2"` → 读取 2 字（32 位）
//!   - 十六进制编号软元件：W、X、Y、B（如 `"X1F"`）
//! - **Modbus**：`"50"` → 保持寄存器 50；可选前缀 `HR` / `IR` / `CO` / `DI`
//!   - 解析后再加上设备配置的线性偏移
//! - **模拟**：任意非空字符串

use crate::error::ProtocolError;
use crate::types::{McAddress, McDevice, ModbusAddress, PointAddress, RegisterTable};

/// MC 3E 帧起始编号为 3 字节
const MC_MAX_HEAD: u32 = 0x00FF_FFFF;

/// 按名称长度降序匹配（避免 "R" 抢先匹配 "ZR"）
const MC_DEVICES: [McDevice; 9] = [
    McDevice::ZR,
    McDevice::D,
    McDevice::W,
    McDevice::R,
    McDevice::M,
    McDevice::X,
    McDevice::Y,
    McDevice::B,
    McDevice::L,
];

/// 解析 MC 地址："D430" 或 "D430:2"
pub fn parse_mc_address(point: &str) -> Result<McAddress, ProtocolError> {
    let (body, count_str) = match point.split_once(':') {
        Some((body, count)) => (body, Some(count)),
        None => (point, None),
    };
    let upper = body.trim().to_ascii_uppercase();

    let device = MC_DEVICES
        .iter()
        .copied()
        .find(|device| upper.starts_with(device.name()))
        .ok_or_else(|| ProtocolError::ConfigParse(format!("unknown mc device: {}", point)))?;
    let number = &upper[device.name().len()..];
    if number.is_empty() {
        return Err(ProtocolError::ConfigParse(format!(
            "missing device number: {}",
            point
        )));
    }
    let head = u32::from_str_radix(number, device.radix())
        .map_err(|_| ProtocolError::ConfigParse(format!("invalid device number: {}", point)))?;
    if head > MC_MAX_HEAD {
        return Err(ProtocolError::ConfigParse(format!(
            "device number out of range: {}",
            point
        )));
    }

    // 未给出点数时隐含为 1
    let count = match count_str {
        None => 1,
        Some(value) => value
            .trim()
            .parse::<u16>()
            .map_err(|_| ProtocolError::ConfigParse(format!("invalid point count: {}", point)))?,
    };
    let max_count = if device.is_bit() { 1 } else { 2 };
    if count == 0 || count > max_count {
        return Err(ProtocolError::ConfigParse(format!(
            "unsupported point count {} for {}",
            count, point
        )));
    }

    Ok(McAddress {
        device,
        head,
        count,
    })
}

/// 解析 Modbus 地址并应用线性偏移
pub fn parse_modbus_address(point: &str, offset: i32) -> Result<ModbusAddress, ProtocolError> {
    let upper = point.trim().to_ascii_uppercase();
    let (table, number) = if let Some(rest) = upper.strip_prefix("HR") {
        (RegisterTable::Holding, rest)
    } else if let Some(rest) = upper.strip_prefix("IR") {
        (RegisterTable::Input, rest)
    } else if let Some(rest) = upper.strip_prefix("CO") {
        (RegisterTable::Coil, rest)
    } else if let Some(rest) = upper.strip_prefix("DI") {
        (RegisterTable::DiscreteInput, rest)
    } else {
        (RegisterTable::Holding, upper.as_str())
    };

    let parsed = number
        .parse::<u32>()
        .map_err(|_| ProtocolError::ConfigParse(format!("invalid register: {}", point)))?;
    let register = i64::from(parsed) + i64::from(offset);
    let register = u16::try_from(register).map_err(|_| {
        ProtocolError::ConfigParse(format!(
            "register out of range after offset {}: {}",
            offset, point
        ))
    })?;

    Ok(ModbusAddress { table, register })
}

/// 模拟点位：以标识字节和作为波形相位种子
pub fn parse_simulated_address(point: &str) -> PointAddress {
    let seed = point
        .bytes()
        .fold(0u32, |acc, byte| acc.wrapping_mul(31).wrapping_add(u32::from(byte)));
    PointAddress::Simulated { seed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mc_implicit_count() {
        let address = parse_mc_address("D430").unwrap();
        assert_eq!(address.device, McDevice::D);
        assert_eq!(address.head, 430);
        assert_eq!(address.count, 1);
    }

    #[test]
    fn test_mc_explicit_count_and_case() {
        let address = parse_mc_address("d100:2").unwrap();
        assert_eq!(address.device, McDevice::D);
        assert_eq!(address.head, 100);
        assert_eq!(address.count, 2);
    }

    #[test]
    fn test_mc_hex_and_two_letter_devices() {
        let x = parse_mc_address("X1F").unwrap();
        assert_eq!(x.device, McDevice::X);
        assert_eq!(x.head, 0x1F);

        let zr = parse_mc_address("ZR1000").unwrap();
        assert_eq!(zr.device, McDevice::ZR);
        assert_eq!(zr.head, 1000);

        let r = parse_mc_address("R12").unwrap();
        assert_eq!(r.device, McDevice::R);
    }

    #[test]
    fn test_mc_rejects_invalid() {
        assert!(parse_mc_address("Q10").is_err());
        assert!(parse_mc_address("D").is_err());
        assert!(parse_mc_address("D12A").is_err());
        assert!(parse_mc_address("D10:3").is_err());
        assert!(parse_mc_address("M10:2").is_err());
        assert!(parse_mc_address("D10:0").is_err());
    }

    #[test]
    fn test_modbus_bare_number_is_holding() {
        let address = parse_modbus_address("50", 0).unwrap();
        assert_eq!(address.table, RegisterTable::Holding);
        assert_eq!(address.register, 50);
    }

    #[test]
    fn test_modbus_prefixes_and_offset() {
        let input = parse_modbus_address("IR10", 0).unwrap();
        assert_eq!(input.table, RegisterTable::Input);
        let coil = parse_modbus_address("co3", 0).unwrap();
        assert_eq!(coil.table, RegisterTable::Coil);
        // 线圈前缀是两个字母，单个 C 不是合法前缀
        assert!(parse_modbus_address("C7", 0).is_err());
        let di = parse_modbus_address("DI7", 0).unwrap();
        assert_eq!(di.table, RegisterTable::DiscreteInput);

        // 从 1 开始编址的设备
        let shifted = parse_modbus_address("1", -1).unwrap();
        assert_eq!(shifted.register, 0);
        assert!(parse_modbus_address("0", -1).is_err());
        assert!(parse_modbus_address("65535", 1).is_err());
    }

    #[test]
    fn test_simulated_seed_is_stable() {
        assert_eq!(
            parse_simulated_address("temp"),
            parse_simulated_address("temp")
        );
        assert_ne!(
            parse_simulated_address("temp"),
            parse_simulated_address("flow")
        );
    }
}
