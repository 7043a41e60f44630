//! 协议常量定义
//!
//! 集中定义所有协议相关的常量，避免在代码中散落"魔法数"。

/// 舵机角度指令名（RT-Thread MSH 命令）
pub const SET_ANGLE_COMMAND: &str = "set_servo_angle";

/// 请求行终止符
pub const LINE_TERMINATOR: &str = "\r\n";

/// 完成判定关键字
///
/// 下位机应答行中包含此子串即认为指令已执行完毕。
pub const ACK_TOKEN: &str = "degrees";

/// 舵机最小角度（度）
pub const MIN_ANGLE: u8 = 0;

/// 舵机最大角度（度）
pub const MAX_ANGLE: u8 = 180;

/// PWM 周期（纳秒），20ms
pub const PWM_PERIOD_NS: u32 = 20_000_000;

/// 0° 对应脉宽（纳秒）
pub const PULSE_MIN_NS: u32 = 500_000;

/// 0°-180° 脉宽跨度（纳秒）
pub const PULSE_SPAN_NS: u32 = 2_000_000;

/// 默认串口波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_constants() {
        // 0.5ms ~ 2.5ms 覆盖 0°-180°
        assert_eq!(PULSE_MIN_NS, 500_000);
        assert_eq!(PULSE_MIN_NS + PULSE_SPAN_NS, 2_500_000);
        assert!(PULSE_MIN_NS + PULSE_SPAN_NS < PWM_PERIOD_NS);
    }

    #[test]
    fn test_wire_constants() {
        assert_eq!(SET_ANGLE_COMMAND, "set_servo_angle");
        assert_eq!(LINE_TERMINATOR, "\r\n");
        assert_eq!(ACK_TOKEN, "degrees");
        assert_eq!(MAX_ANGLE, 180);
    }
}
