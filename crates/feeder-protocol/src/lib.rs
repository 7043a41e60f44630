//! # Feeder Protocol
//!
//! 喂食机械臂舵机串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 舵机 ID 枚举（固定集合 1-4）
//! - `constants`: 协议常量定义
//! - `control`: 控制指令构建与解析（`set_servo_angle <id> <angle>\r\n`）
//! - `feedback`: 下位机应答解析（完成判定、结构化回复）
//!
//! ## 线协议
//!
//! ```text
//! 上位机 → 下位机:  set_servo_angle 2 45\r\n
//! 下位机 → 上位机:  Servo 2 set to 45 degrees (pulse: 1000000 ns)\r\n
//! ```
//!
//! 应答为零行或多行文本；出现包含 `degrees` 的行即视为下位机已完成该指令。

pub mod constants;
pub mod control;
pub mod feedback;
pub mod ids;

// 重新导出常用类型
pub use constants::*;
pub use control::ServoCommand;
pub use feedback::{DeviceReply, is_completion_line, pulse_width_ns};
pub use ids::ServoId;

use thiserror::Error;

/// 协议错误类型
///
/// 同时承担"手动输入非法"（InvalidManualInput）的语义：
/// 舵机 ID 或角度越界的请求在任何传输发生之前就被拒绝。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid servo id: {0} (expected 1-4)")]
    InvalidServoId(i64),

    #[error("Angle out of range: {0} (expected 0-180)")]
    AngleOutOfRange(i64),

    #[error("Malformed command line: {0:?}")]
    MalformedCommand(String),
}
