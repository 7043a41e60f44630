//! 模拟下位机
//!
//! 在内存中模拟舵机控制板固件：解析 `set_servo_angle` 请求行，
//! 按固件格式返回 `Servo <id> set to <angle> degrees (pulse: <ns> ns)` 或错误提示。
//!
//! `MockDevice` 是可克隆的共享句柄，测试代码保留一份用于注入故障、检查写入记录；
//! `MockTransport` 交给链路层使用。
//!
//! # 示例
//!
//! ```rust
//! use feeder_serial::{MockDevice, SerialTransport};
//! use std::time::Duration;
//!
//! let device = MockDevice::new();
//! let mut transport = device.transport();
//! transport.write_all(b"set_servo_angle 2 45\r\n").unwrap();
//! let line = transport.read_line(Duration::from_millis(10)).unwrap();
//! assert_eq!(line.as_deref(), Some("Servo 2 set to 45 degrees (pulse: 1000000 ns)"));
//! ```

use crate::{LineBuffer, SerialError, SerialTransport};
use feeder_protocol::{DeviceReply, ProtocolError, SET_ANGLE_COMMAND, ServoCommand, ServoId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const ERR_ANGLE: &str = "Error: Angle out of range (0-180)!";
const ERR_SERVO: &str = "Error: Invalid servo ID (1-4)!";
const USAGE: &str = "Usage: set_angle [servo_id 1-4] [angle 0-180]";

#[derive(Debug)]
struct DeviceState {
    /// 下位机 → 上位机的待读行
    outbound: VecDeque<String>,
    /// 上位机写入的原始行（按顺序）
    written: Vec<String>,
    angles: [Option<u8>; 4],
    silent: bool,
    echo: bool,
    fail_writes: bool,
    panic_on_write: bool,
    idle_wait: Option<Duration>,
    clear_count: usize,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            outbound: VecDeque::new(),
            written: Vec::new(),
            angles: [None; 4],
            silent: false,
            echo: false,
            fail_writes: false,
            panic_on_write: false,
            idle_wait: None,
            clear_count: 0,
        }
    }
}

impl DeviceState {
    fn handle_line(&mut self, line: String) {
        if self.echo {
            self.outbound.push_back(line.clone());
        }

        let reply = match ServoCommand::parse(&line) {
            Ok(cmd) => {
                self.angles[cmd.id().index()] = Some(cmd.angle());
                DeviceReply::applied_text(cmd.id().number(), cmd.angle())
            },
            Err(ProtocolError::InvalidServoId(_)) => ERR_SERVO.to_string(),
            Err(ProtocolError::AngleOutOfRange(_)) => ERR_ANGLE.to_string(),
            Err(ProtocolError::MalformedCommand(_)) => {
                if line.starts_with(SET_ANGLE_COMMAND) {
                    USAGE.to_string()
                } else {
                    let name = line.split_whitespace().next().unwrap_or_default();
                    format!("{name}: command not found.")
                }
            },
        };

        self.written.push(line);
        if !self.silent {
            self.outbound.push_back(reply);
        }
    }
}

/// 模拟下位机共享句柄
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// 创建应答正常的模拟下位机
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建从不应答的模拟下位机（角度仍会被应用）
    pub fn silent() -> Self {
        let device = Self::new();
        device.set_silent(true);
        device
    }

    /// 创建连接到本设备的传输端
    pub fn transport(&self) -> MockTransport {
        MockTransport {
            device: self.clone(),
            name: "mock".to_string(),
            rx: LineBuffer::new(),
        }
    }

    /// 关闭/开启应答
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// 回显请求行（模拟 MSH 终端回显）
    pub fn set_echo(&self, echo: bool) {
        self.state.lock().echo = echo;
    }

    /// 后续写入全部失败（模拟拔线）
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// 后续写入直接 panic（模拟驱动层崩溃）
    pub fn set_panic_on_write(&self, panic: bool) {
        self.state.lock().panic_on_write = panic;
    }

    /// 无数据时 `read_line` 的最长等待时间
    ///
    /// 默认等待调用方给出的完整超时；测试可以缩短以加速静默场景。
    pub fn set_idle_wait(&self, wait: Duration) {
        self.state.lock().idle_wait = Some(wait);
    }

    /// 注入一行下位机输出（如上电日志、陈旧数据）
    pub fn inject_line(&self, line: impl Into<String>) {
        self.state.lock().outbound.push_back(line.into());
    }

    /// 已写入的原始请求行
    pub fn written_lines(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    /// 已写入且合法的舵机指令
    pub fn commands(&self) -> Vec<ServoCommand> {
        self.state
            .lock()
            .written
            .iter()
            .filter_map(|line| ServoCommand::parse(line).ok())
            .collect()
    }

    /// 清空写入记录
    pub fn clear_history(&self) {
        self.state.lock().written.clear();
    }

    /// 舵机当前角度（从未设置过为 `None`）
    pub fn angle(&self, id: ServoId) -> Option<u8> {
        self.state.lock().angles[id.index()]
    }

    /// 全部舵机当前角度，按 ID 升序
    pub fn angles(&self) -> [Option<u8>; 4] {
        self.state.lock().angles
    }

    /// 输入缓冲被清空的次数
    pub fn clear_count(&self) -> usize {
        self.state.lock().clear_count
    }

    /// 尚未被读走的下位机输出行数
    pub fn pending_lines(&self) -> usize {
        self.state.lock().outbound.len()
    }
}

/// 模拟串口传输端
#[derive(Debug)]
pub struct MockTransport {
    device: MockDevice,
    name: String,
    rx: LineBuffer,
}

impl MockTransport {
    /// 设置端口名（日志用）
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 所连接的模拟设备
    pub fn device(&self) -> &MockDevice {
        &self.device
    }
}

impl SerialTransport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let mut state = self.device.state.lock();
        if state.panic_on_write {
            drop(state);
            panic!("mock device driver crashed");
        }
        if state.fail_writes {
            return Err(SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock device unplugged",
            )));
        }

        self.rx.extend(bytes);
        while let Some(line) = self.rx.take_line() {
            state.handle_line(line);
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, SerialError> {
        let wait = {
            let mut state = self.device.state.lock();
            if let Some(line) = state.outbound.pop_front() {
                return Ok(Some(line));
            }
            state.idle_wait.map_or(timeout, |idle| idle.min(timeout))
        };

        // 不持锁等待，测试线程可以在此期间注入数据
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        Ok(self.device.state.lock().outbound.pop_front())
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        let mut state = self.device.state.lock();
        state.outbound.clear();
        state.clear_count += 1;
        Ok(())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}
