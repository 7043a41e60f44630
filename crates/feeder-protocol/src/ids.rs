//! 舵机 ID 定义
//!
//! 机械臂共 4 个舵机，ID 固定为 1-4，设计期确定，不可扩展。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 舵机 ID
///
/// | ID | 角色 | 说明 |
/// |----|------|------|
/// | 1 | `Horizontal` | 水平舵机，跟随嘴部左右偏移 |
/// | 2 | `Vertical` | 垂直舵机，跟随嘴部上下偏移 |
/// | 3 | `Wrist` | 腕部舵机，喂食过程中保持不变 |
/// | 4 | `Feeder` | 末端喂食舵机，喂食时转到喂食角度 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ServoId {
    /// 水平舵机（ID 1）
    Horizontal = 1,
    /// 垂直舵机（ID 2）
    Vertical = 2,
    /// 腕部舵机（ID 3）
    Wrist = 3,
    /// 喂食舵机（ID 4）
    Feeder = 4,
}

impl ServoId {
    /// 全部舵机，按 ID 升序
    pub const ALL: [ServoId; 4] = [
        ServoId::Horizontal,
        ServoId::Vertical,
        ServoId::Wrist,
        ServoId::Feeder,
    ];

    /// 线协议中使用的数字 ID
    #[inline]
    pub fn number(self) -> u8 {
        self.into()
    }

    /// 从 0 开始的数组下标（ID - 1）
    #[inline]
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    /// 从任意整数解析舵机 ID（手动输入校验）
    ///
    /// # 错误
    /// - `ProtocolError::InvalidServoId`: 不在 1-4 范围内
    pub fn from_raw(raw: i64) -> Result<Self, ProtocolError> {
        u8::try_from(raw)
            .ok()
            .and_then(|value| ServoId::try_from(value).ok())
            .ok_or(ProtocolError::InvalidServoId(raw))
    }
}

impl fmt::Display for ServoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_servo_id_numbers() {
        assert_eq!(ServoId::Horizontal.number(), 1);
        assert_eq!(ServoId::Vertical.number(), 2);
        assert_eq!(ServoId::Wrist.number(), 3);
        assert_eq!(ServoId::Feeder.number(), 4);
    }

    #[test]
    fn test_servo_id_index() {
        for (i, id) in ServoId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_servo_id_try_from() {
        assert_eq!(ServoId::try_from(3u8).unwrap(), ServoId::Wrist);
        assert!(ServoId::try_from(0u8).is_err());
        assert!(ServoId::try_from(5u8).is_err());
    }

    #[test]
    fn test_servo_id_from_raw() {
        assert_eq!(ServoId::from_raw(1), Ok(ServoId::Horizontal));
        assert_eq!(ServoId::from_raw(5), Err(ProtocolError::InvalidServoId(5)));
        assert_eq!(ServoId::from_raw(-1), Err(ProtocolError::InvalidServoId(-1)));
        assert_eq!(
            ServoId::from_raw(257),
            Err(ProtocolError::InvalidServoId(257))
        );
    }

    #[test]
    fn test_servo_id_display() {
        assert_eq!(ServoId::Vertical.to_string(), "2");
    }
}
