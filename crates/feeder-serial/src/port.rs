//! 基于 `serialport` 的真实串口后端

use crate::{LineBuffer, SerialDeviceError, SerialDeviceErrorKind, SerialError, SerialTransport};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 单次 read 调用的最小等待时间（避免零超时在部分平台上的未定义行为）
const MIN_READ_SLICE: Duration = Duration::from_millis(1);

/// 默认字节超时
pub const DEFAULT_BYTE_TIMEOUT: Duration = Duration::from_secs(1);

/// 真实串口传输
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
    name: String,
    lines: LineBuffer,
}

impl SerialPortTransport {
    /// 打开串口
    ///
    /// # 参数
    /// - `path`: 端口路径（如 `/dev/ttyUSB0`、`COM3`）
    /// - `baud_rate`: 波特率（通常 115200）
    ///
    /// # 错误
    /// - `SerialError::Device`: 端口不存在、被占用或参数非法
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate)
            .timeout(DEFAULT_BYTE_TIMEOUT)
            .open()
            .map_err(SerialDeviceError::from)?;

        debug!("Serial port {} opened at {} baud", path, baud_rate);

        Ok(Self {
            port,
            name: path.to_string(),
            lines: LineBuffer::new(),
        })
    }
}

impl SerialTransport for SerialPortTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, SerialError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];

        loop {
            if let Some(line) = self.lines.take_line() {
                trace!("rx line from {}: {:?}", self.name, line);
                return Ok(Some(line));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            self.port
                .set_timeout(remaining.max(MIN_READ_SLICE))
                .map_err(SerialDeviceError::from)?;

            match self.port.read(&mut chunk) {
                Ok(0) => continue,
                Ok(n) => self.lines.extend(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    continue;
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.lines.clear();
        self.port.clear(ClearBuffer::Input).map_err(SerialDeviceError::from)?;
        Ok(())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

impl From<serialport::Error> for SerialDeviceError {
    fn from(err: serialport::Error) -> Self {
        let kind = match err.kind() {
            serialport::ErrorKind::NoDevice => SerialDeviceErrorKind::NoDevice,
            serialport::ErrorKind::InvalidInput => SerialDeviceErrorKind::InvalidConfig,
            serialport::ErrorKind::Io(ErrorKind::NotFound) => SerialDeviceErrorKind::NotFound,
            serialport::ErrorKind::Io(ErrorKind::PermissionDenied) => {
                SerialDeviceErrorKind::AccessDenied
            },
            serialport::ErrorKind::Io(ErrorKind::ResourceBusy) => SerialDeviceErrorKind::Busy,
            _ => SerialDeviceErrorKind::Unknown,
        };
        SerialDeviceError::new(kind, err.description)
    }
}

/// 列出系统可见的串口名
pub fn available_ports() -> Result<Vec<String>, SerialError> {
    let ports = serialport::available_ports().map_err(SerialDeviceError::from)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialPortTransport::open("/dev/this-port-does-not-exist", 115_200);
        assert!(matches!(result, Err(SerialError::Device(_))));
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        let dev: SerialDeviceError = err.into();
        assert_eq!(dev.kind, SerialDeviceErrorKind::NoDevice);
        assert!(dev.is_fatal());
        assert_eq!(dev.message, "gone");
    }

    #[test]
    #[ignore] // 需要真实串口设备
    fn test_real_port_roundtrip() {
        let path = std::env::var("FEEDER_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
        let mut port = SerialPortTransport::open(&path, 115_200).unwrap();
        port.clear_input().unwrap();
        port.write_all(b"set_servo_angle 1 120\r\n").unwrap();
        let line = port.read_line(Duration::from_secs(1)).unwrap();
        assert!(line.is_some());
    }
}
