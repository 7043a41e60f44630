//! 控制指令构建
//!
//! 请求行格式：`set_servo_angle <id> <angle>\r\n`，十进制整数，无前导零要求。

use crate::constants::{LINE_TERMINATOR, MAX_ANGLE, SET_ANGLE_COMMAND};
use crate::ids::ServoId;
use crate::ProtocolError;
use std::fmt;

/// 舵机角度指令
///
/// **不变量**：`angle` 始终在 `[0, 180]` 范围内。
/// 越界角度属于编程错误，构造时会被钳位（debug 构建下触发断言），
/// 不会作为运行时条件透传给下位机。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServoCommand {
    id: ServoId,
    angle: u8,
}

impl ServoCommand {
    /// 创建指令（角度钳位到 `[0, 180]`）
    pub fn new(id: ServoId, angle: u8) -> Self {
        debug_assert!(
            angle <= MAX_ANGLE,
            "servo angle {angle} exceeds {MAX_ANGLE}, clamp before building a command"
        );
        Self {
            id,
            angle: angle.min(MAX_ANGLE),
        }
    }

    /// 从有符号角度创建指令，越界值钳位到 `[0, 180]`
    ///
    /// 用于映射计算结果（可能略微越界的整数）。
    pub fn clamped(id: ServoId, angle: i32) -> Self {
        Self {
            id,
            angle: angle.clamp(0, MAX_ANGLE as i32) as u8,
        }
    }

    /// 校验并创建指令（手动输入路径）
    ///
    /// # 错误
    /// - `ProtocolError::InvalidServoId`: ID 不在 1-4
    /// - `ProtocolError::AngleOutOfRange`: 角度不在 0-180
    pub fn try_from_raw(id: i64, angle: i64) -> Result<Self, ProtocolError> {
        let id = ServoId::from_raw(id)?;
        if !(0..=MAX_ANGLE as i64).contains(&angle) {
            return Err(ProtocolError::AngleOutOfRange(angle));
        }
        Ok(Self {
            id,
            angle: angle as u8,
        })
    }

    /// 舵机 ID
    #[inline]
    pub fn id(&self) -> ServoId {
        self.id
    }

    /// 目标角度（度）
    #[inline]
    pub fn angle(&self) -> u8 {
        self.angle
    }

    /// 编码为完整请求行（含 `\r\n`）
    pub fn encode(&self) -> String {
        format!("{self}{LINE_TERMINATOR}")
    }

    /// 编码为待写入串口的字节
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }

    /// 解析请求行（容忍首尾空白与缺失的行终止符）
    ///
    /// 主要用于模拟下位机和日志回放。
    ///
    /// # 错误
    /// - `ProtocolError::MalformedCommand`: 指令名或参数个数不符
    /// - `ProtocolError::InvalidServoId` / `AngleOutOfRange`: 参数越界
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedCommand(line.trim().to_string());

        let mut parts = line.split_whitespace();
        if parts.next() != Some(SET_ANGLE_COMMAND) {
            return Err(malformed());
        }
        let id = parts.next().ok_or_else(malformed)?;
        let angle = parts.next().ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }

        let id: i64 = id.parse().map_err(|_| malformed())?;
        let angle: i64 = angle.parse().map_err(|_| malformed())?;
        Self::try_from_raw(id, angle)
    }
}

impl fmt::Display for ServoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", SET_ANGLE_COMMAND, self.id, self.angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_literal_bytes() {
        let cmd = ServoCommand::new(ServoId::Vertical, 45);
        assert_eq!(cmd.to_bytes(), b"set_servo_angle 2 45\r\n".to_vec());
    }

    #[test]
    fn test_encode_no_leading_zeros() {
        let cmd = ServoCommand::new(ServoId::Feeder, 0);
        assert_eq!(cmd.encode(), "set_servo_angle 4 0\r\n");

        let cmd = ServoCommand::new(ServoId::Horizontal, 7);
        assert_eq!(cmd.encode(), "set_servo_angle 1 7\r\n");
    }

    #[test]
    fn test_clamped() {
        assert_eq!(ServoCommand::clamped(ServoId::Wrist, -12).angle(), 0);
        assert_eq!(ServoCommand::clamped(ServoId::Wrist, 181).angle(), 180);
        assert_eq!(ServoCommand::clamped(ServoId::Wrist, 90).angle(), 90);
    }

    #[test]
    fn test_try_from_raw_rejects_out_of_range() {
        assert_eq!(
            ServoCommand::try_from_raw(5, 90),
            Err(ProtocolError::InvalidServoId(5))
        );
        assert_eq!(
            ServoCommand::try_from_raw(1, 200),
            Err(ProtocolError::AngleOutOfRange(200))
        );
        assert_eq!(
            ServoCommand::try_from_raw(1, -1),
            Err(ProtocolError::AngleOutOfRange(-1))
        );
        assert_eq!(
            ServoCommand::try_from_raw(1, 180),
            Ok(ServoCommand::new(ServoId::Horizontal, 180))
        );
    }

    #[test]
    fn test_parse() {
        let cmd = ServoCommand::parse("set_servo_angle 3 120\r\n").unwrap();
        assert_eq!(cmd.id(), ServoId::Wrist);
        assert_eq!(cmd.angle(), 120);

        assert!(matches!(
            ServoCommand::parse("set_angle 3 120"),
            Err(ProtocolError::MalformedCommand(_))
        ));
        assert!(matches!(
            ServoCommand::parse("set_servo_angle 3"),
            Err(ProtocolError::MalformedCommand(_))
        ));
        assert!(matches!(
            ServoCommand::parse("set_servo_angle 3 abc"),
            Err(ProtocolError::MalformedCommand(_))
        ));
        assert_eq!(
            ServoCommand::parse("set_servo_angle 9 10"),
            Err(ProtocolError::InvalidServoId(9))
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_shape() {
        let cmd = ServoCommand::new(ServoId::Horizontal, 106);
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("106"));
    }
}
