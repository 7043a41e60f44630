//! 驱动层错误类型定义

use feeder_serial::SerialError;
use thiserror::Error;

/// 串口连接失败
///
/// 端口不存在、被占用或参数非法；连接尝试终止，调用方保持未连接状态。
#[derive(Error, Debug)]
#[error("Failed to open serial port {port}: {source}")]
pub struct ConnectError {
    /// 尝试打开的端口
    pub port: String,
    #[source]
    pub source: SerialError,
}

impl ConnectError {
    pub fn new(port: impl Into<String>, source: SerialError) -> Self {
        Self {
            port: port.into(),
            source,
        }
    }
}

/// 指令发送失败
#[derive(Error, Debug)]
pub enum SendError {
    /// 链路已关闭（或从未打开）
    #[error("Serial link is closed")]
    Closed,

    /// 底层传输错误（写入或读取失败）
    #[error("Serial transport error: {0}")]
    Transport(#[from] SerialError),
}

/// 视觉采集/推理错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisionError {
    /// 相机无法读取
    #[error("Frame capture failed: {0}")]
    Capture(String),

    /// 关键点推理失败
    #[error("Landmark inference failed: {0}")]
    Inference(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let err = ConnectError::new("/dev/ttyUSB9", SerialError::Closed);
        let msg = format!("{}", err);
        assert!(msg.contains("/dev/ttyUSB9"), "message: {}", msg);
        assert!(msg.contains("Port closed"), "message: {}", msg);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_send_error_display() {
        assert_eq!(format!("{}", SendError::Closed), "Serial link is closed");

        let err: SendError = SerialError::Closed.into();
        assert!(matches!(err, SendError::Transport(SerialError::Closed)));
    }

    #[test]
    fn test_vision_error_display() {
        let msg = format!("{}", VisionError::Capture("device lost".into()));
        assert!(msg.contains("capture") && msg.contains("device lost"));
    }
}
