//! 验证辅助函数
//!
//! - ensure_hour：小时列下标必须在 0..24 内
//! - ensure_date_range：起始日期不得晚于结束日期
//! - hour_column：小时下标 → 列名（`h00`..`h23`）
//!
//! 列名只由校验过的下标生成，SQL 中不会出现外部输入。

use crate::error::StorageError;
use chrono::NaiveDate;
use domain::HOURS_PER_DAY;

/// 验证小时下标
pub fn ensure_hour(hour: usize) -> Result<(), StorageError> {
    if hour >= HOURS_PER_DAY {
        return Err(StorageError::new(format!("hour out of range: {}", hour)));
    }
    Ok(())
}

/// 验证日期范围
pub fn ensure_date_range(from: NaiveDate, to: NaiveDate) -> Result<(), StorageError> {
    if from > to {
        return Err(StorageError::new(format!(
            "invalid date range: {} > {}",
            from, to
        )));
    }
    Ok(())
}

/// 小时列名
pub fn hour_column(hour: usize) -> Result<String, StorageError> {
    ensure_hour(hour)?;
    Ok(format!("h{:02}", hour))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_column_is_zero_padded() {
        assert_eq!(hour_column(0).unwrap(), "h00");
        assert_eq!(hour_column(23).unwrap(), "h23");
        assert!(hour_column(24).is_err());
    }

    #[test]
    fn date_range_must_be_ordered() {
        let a = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert!(ensure_date_range(a, b).is_ok());
        assert!(ensure_date_range(a, a).is_ok());
        assert!(ensure_date_range(b, a).is_err());
    }
}
