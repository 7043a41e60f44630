//! # Feeder Serial Transport Layer
//!
//! 串口硬件抽象层，为舵机链路提供统一的"写一行 / 限时读一行"接口。
//!
//! - `port`: 基于 `serialport` 的真实串口后端（feature `native`，默认开启）
//! - `mock`: 模拟下位机固件的内存后端（feature `mock`，用于测试与离线演示）

use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "native")]
pub mod port;

#[cfg(feature = "native")]
pub use port::{SerialPortTransport, available_ports};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockDevice, MockTransport};

/// 串口适配层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),
    #[error("Port closed")]
    Closed,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    InvalidConfig,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 设备不存在或无权限，重试没有意义
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NoDevice
                | SerialDeviceErrorKind::AccessDenied
                | SerialDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for SerialDeviceError {
    fn from(message: &str) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

/// 面向行的串口传输
///
/// 实现方负责缓冲半行数据；`read_line` 返回的行已去除行终止符与首尾空白，
/// 空行不会返回。
pub trait SerialTransport: Send {
    /// 写入完整字节序列并刷新
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 在 `timeout` 内读取一行
    ///
    /// 超时返回 `Ok(None)`，超时不是错误。
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, SerialError>;

    /// 丢弃输入缓冲区中的陈旧数据
    fn clear_input(&mut self) -> Result<(), SerialError>;

    /// 端口名（日志用）
    fn port_name(&self) -> &str {
        "unknown"
    }
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write_all(bytes)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, SerialError> {
        (**self).read_line(timeout)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        (**self).clear_input()
    }

    fn port_name(&self) -> &str {
        (**self).port_name()
    }
}

/// 从原始字节中切出完整行
///
/// 后端共享的行缓冲：累积收到的字节，按 `\n` 切分，去除 `\r` 与首尾空白，
/// 跳过空行。非 UTF-8 字节按有损方式解码。
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加收到的字节
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// 取出下一条非空完整行
    pub fn take_line(&mut self) -> Option<String> {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// 丢弃所有缓冲数据
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_splits_on_newline() {
        let mut buf = LineBuffer::new();
        buf.extend(b"Servo 2 set to 45 deg");
        assert_eq!(buf.take_line(), None);

        buf.extend(b"rees (pulse: 1000000 ns)\r\nmsh >");
        assert_eq!(
            buf.take_line().as_deref(),
            Some("Servo 2 set to 45 degrees (pulse: 1000000 ns)")
        );
        assert_eq!(buf.take_line(), None);
        assert!(!buf.is_empty());
    }

    #[test]
    fn test_line_buffer_skips_blank_lines() {
        let mut buf = LineBuffer::new();
        buf.extend(b"\r\n\r\n  \nhello\r\n");
        assert_eq!(buf.take_line().as_deref(), Some("hello"));
        assert_eq!(buf.take_line(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_line_buffer_lossy_utf8() {
        let mut buf = LineBuffer::new();
        buf.extend(&[0xff, b'o', b'k', b'\n']);
        let line = buf.take_line().unwrap();
        assert!(line.ends_with("ok"));
    }

    #[test]
    fn test_device_error_fatal() {
        assert!(SerialDeviceError::new(SerialDeviceErrorKind::NotFound, "x").is_fatal());
        assert!(!SerialDeviceError::new(SerialDeviceErrorKind::Busy, "x").is_fatal());
        let err: SerialDeviceError = "boom".into();
        assert_eq!(err.kind, SerialDeviceErrorKind::Unknown);
        assert!(format!("{}", SerialError::Device(err)).contains("boom"));
    }
}
