//! 输入验证模块
//!
//! 解析命令行与 REPL 中的坐标、时长参数

use anyhow::{Result, bail};
use std::time::Duration;

/// 解析像素坐标 `X,Y`
///
/// # 错误
/// 格式不是两个逗号分隔的整数，或坐标为负
pub fn parse_target(input: &str) -> Result<(i32, i32)> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    let [x, y] = parts.as_slice() else {
        bail!("目标坐标格式应为 X,Y，得到 '{}'", input);
    };

    let x: i32 = x
        .parse()
        .map_err(|_| anyhow::anyhow!("无效的 X 坐标: '{}'", x))?;
    let y: i32 = y
        .parse()
        .map_err(|_| anyhow::anyhow!("无效的 Y 坐标: '{}'", y))?;

    if x < 0 || y < 0 {
        bail!("目标坐标不能为负: ({}, {})", x, y);
    }
    Ok((x, y))
}

/// 解析时长（秒）
///
/// # 错误
/// 时长为 NaN、无穷大或负数
pub fn parse_duration(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| anyhow::anyhow!("无效的时长: {} 秒", seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("420,240").unwrap(), (420, 240));
        assert_eq!(parse_target(" 0 , 479 ").unwrap(), (0, 479));
    }

    #[test]
    fn test_parse_target_rejects_bad_input() {
        assert!(parse_target("420").is_err());
        assert!(parse_target("420,240,1").is_err());
        assert!(parse_target("x,240").is_err());
        assert!(parse_target("-1,240").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(1.5).unwrap(), Duration::from_millis(1500));
        assert!(parse_duration(-1.0).is_err());
        assert!(parse_duration(f64::NAN).is_err());
    }
}
