//! 下位机应答解析
//!
//! 下位机（RT-Thread MSH）对 `set_servo_angle` 的应答：
//!
//! - 成功：`Servo <id> set to <angle> degrees (pulse: <ns> ns)`
//! - 参数错误：`Error: Angle out of range (0-180)!` / `Error: Invalid servo ID (1-4)!`
//! - 参数个数错误：`Usage: set_angle [servo_id 1-4] [angle 0-180]`
//!
//! 完成判定只看 [`ACK_TOKEN`](crate::constants::ACK_TOKEN)；结构化解析仅用于日志与诊断。

use crate::constants::{ACK_TOKEN, MAX_ANGLE, PULSE_MIN_NS, PULSE_SPAN_NS};

/// 判断应答行是否表示下位机已完成指令
#[inline]
pub fn is_completion_line(line: &str) -> bool {
    line.contains(ACK_TOKEN)
}

/// 计算角度对应的 PWM 脉宽（纳秒）
///
/// 与下位机固件保持一致：`500000 + angle * 2000000 / 180`（整数除法）。
pub fn pulse_width_ns(angle: u8) -> u32 {
    let angle = angle.min(MAX_ANGLE) as u32;
    angle * PULSE_SPAN_NS / MAX_ANGLE as u32 + PULSE_MIN_NS
}

/// 结构化的下位机应答
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceReply {
    /// 舵机已设置到目标角度
    Applied {
        /// 舵机数字 ID（原样保留，不做范围校验）
        servo: u8,
        /// 实际设置角度（度）
        angle: u8,
        /// PWM 脉宽（纳秒），缺失时为 `None`
        pulse_ns: Option<u32>,
    },
    /// 下位机拒绝执行（`Error: ...`）
    Rejected(String),
    /// 参数个数错误（`Usage: ...`）
    Usage(String),
    /// 其他输出（回显、提示符等）
    Other(String),
}

impl DeviceReply {
    /// 解析单行应答
    ///
    /// 容忍行首的提示符或回显前缀（如 `msh >`）。
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if let Some(reply) = Self::parse_applied(line) {
            return reply;
        }
        if let Some(pos) = line.find("Error:") {
            return DeviceReply::Rejected(line[pos + "Error:".len()..].trim().to_string());
        }
        if let Some(pos) = line.find("Usage:") {
            return DeviceReply::Usage(line[pos + "Usage:".len()..].trim().to_string());
        }
        DeviceReply::Other(line.to_string())
    }

    fn parse_applied(line: &str) -> Option<Self> {
        let start = line.find("Servo ")?;
        let mut tokens = line[start + "Servo ".len()..].split_whitespace();

        let servo: u8 = tokens.next()?.parse().ok()?;
        if tokens.next()? != "set" || tokens.next()? != "to" {
            return None;
        }
        let angle: u8 = tokens.next()?.parse().ok()?;
        if tokens.next()? != ACK_TOKEN {
            return None;
        }

        // "(pulse:" "<ns>" "ns)"
        let pulse_ns = match tokens.next() {
            Some("(pulse:") => tokens.next().and_then(|t| t.parse().ok()),
            _ => None,
        };

        Some(DeviceReply::Applied {
            servo,
            angle,
            pulse_ns,
        })
    }

    /// 生成与下位机一致的成功应答文本（不含行终止符）
    pub fn applied_text(servo: u8, angle: u8) -> String {
        format!(
            "Servo {} set to {} degrees (pulse: {} ns)",
            servo,
            angle,
            pulse_width_ns(angle)
        )
    }

    /// 是否为成功应答
    pub fn is_applied(&self) -> bool {
        matches!(self, DeviceReply::Applied { .. })
    }

    /// 是否为拒绝应答（`Error` 或 `Usage`）
    pub fn is_rejection(&self) -> bool {
        matches!(self, DeviceReply::Rejected(_) | DeviceReply::Usage(_))
    }
}
