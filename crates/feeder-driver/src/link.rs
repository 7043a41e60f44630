//! 舵机串口链路（ServoLink）
//!
//! 负责一次"写请求行 → 限时等待应答"的完整事务：
//!
//! 1. 写入 `set_servo_angle <id> <angle>\r\n`
//! 2. 逐行读取应答，直到出现包含 `degrees` 的行，或应答窗口耗尽
//! 3. 返回累计的应答文本（可能为空）
//!
//! 应答缺失不是错误：返回空的 [`ServoAck`]，并通过日志汇以 WARN 级别记录。
//!
//! # 应答窗口
//!
//! 窗口由调用方传入。控制层从标定配置 `[link]` 读取两档预算：
//! 手动设置与绝对瞄准默认 0.5s，控制器序列默认 1.0s。

use crate::error::{ConnectError, SendError};
use crate::sink::SharedLogSink;
use feeder_protocol::{DeviceReply, ServoCommand, is_completion_line};
use feeder_serial::SerialTransport;
use smallvec::SmallVec;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 一次指令事务的应答
#[derive(Debug, Clone)]
pub struct ServoAck {
    /// 已发送的指令
    pub command: ServoCommand,
    /// 收到的应答行（已去除行终止符）
    pub lines: SmallVec<[String; 2]>,
    /// 是否观察到完成行（包含 `degrees`）
    pub confirmed: bool,
    /// 写入到结束等待的耗时
    pub elapsed: Duration,
}

impl ServoAck {
    /// 应答文本，多行以 `\n` 连接；无应答时为空串
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// 是否没有收到任何输出
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 结构化解析全部应答行
    pub fn replies(&self) -> impl Iterator<Item = DeviceReply> + '_ {
        self.lines.iter().map(|line| DeviceReply::parse(line))
    }

    /// 下位机拒绝信息（`Error: ...` / `Usage: ...`）
    pub fn rejection(&self) -> Option<DeviceReply> {
        self.replies().find(DeviceReply::is_rejection)
    }
}

/// 舵机串口链路
///
/// 持有传输句柄直到 [`close`](Self::close) 或 drop；句柄只释放一次。
pub struct ServoLink {
    transport: Option<Box<dyn SerialTransport>>,
    port: String,
    sink: SharedLogSink,
}

impl std::fmt::Debug for ServoLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServoLink")
            .field("port", &self.port)
            .field("open", &self.is_open())
            .finish()
    }
}

impl ServoLink {
    /// 打开串口并清空输入缓冲
    ///
    /// # 参数
    /// - `port`: 端口路径
    /// - `baud_rate`: 波特率
    /// - `sink`: 日志汇
    ///
    /// # 错误
    /// - `ConnectError`: 端口不可用或参数非法
    #[cfg(feature = "native")]
    pub fn connect(port: &str, baud_rate: u32, sink: SharedLogSink) -> Result<Self, ConnectError> {
        let transport = feeder_serial::SerialPortTransport::open(port, baud_rate)
            .map_err(|e| ConnectError::new(port, e))?;
        let link = Self::with_transport(Box::new(transport), sink)?;
        link.sink
            .info(&format!("Connected to {} at {} baud", port, baud_rate));
        Ok(link)
    }

    /// 使用已打开的传输创建链路（清空输入缓冲）
    ///
    /// 用于 mock 传输或自定义后端。
    ///
    /// # 错误
    /// - `ConnectError`: 清空缓冲失败
    pub fn with_transport(
        mut transport: Box<dyn SerialTransport>,
        sink: SharedLogSink,
    ) -> Result<Self, ConnectError> {
        let port = transport.port_name().to_string();
        transport
            .clear_input()
            .map_err(|e| ConnectError::new(port.clone(), e))?;
        debug!("Servo link ready on {}", port);

        Ok(Self {
            transport: Some(transport),
            port,
            sink,
        })
    }

    /// 测试端口能否打开（不发送任何数据）
    ///
    /// # 错误
    /// - `ConnectError`: 端口不可用
    #[cfg(feature = "native")]
    pub fn probe(port: &str, baud_rate: u32) -> Result<(), ConnectError> {
        let transport = feeder_serial::SerialPortTransport::open(port, baud_rate)
            .map_err(|e| ConnectError::new(port, e))?;
        drop(transport);
        debug!("Probe of {} succeeded", port);
        Ok(())
    }

    /// 发送一条指令并在 `timeout` 内等待应答
    ///
    /// 出现完成行即提前返回；窗口耗尽则返回已收到的内容（可能为空）。
    ///
    /// # 错误
    /// - `SendError::Closed`: 链路已关闭
    /// - `SendError::Transport`: 写入或读取失败
    pub fn send_command(
        &mut self,
        command: ServoCommand,
        timeout: Duration,
    ) -> Result<ServoAck, SendError> {
        let transport = self.transport.as_mut().ok_or(SendError::Closed)?;

        let start = Instant::now();
        transport.write_all(&command.to_bytes())?;
        self.sink.info(&format!("Sent: {}", command));

        let deadline = start + timeout;
        let mut lines: SmallVec<[String; 2]> = SmallVec::new();
        let mut confirmed = false;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match transport.read_line(remaining)? {
                Some(line) => {
                    trace!("ack line for '{}': {:?}", command, line);
                    confirmed = is_completion_line(&line);
                    lines.push(line);
                    if confirmed {
                        break;
                    }
                },
                None => break,
            }
        }

        let ack = ServoAck {
            command,
            lines,
            confirmed,
            elapsed: start.elapsed(),
        };
        self.report(&ack, timeout);
        Ok(ack)
    }

    fn report(&self, ack: &ServoAck, timeout: Duration) {
        if ack.is_empty() {
            warn!("No acknowledgement for '{}' on {}", ack.command, self.port);
            self.sink.warn(&format!(
                "No acknowledgement for '{}' within {} ms",
                ack.command,
                timeout.as_millis()
            ));
            return;
        }

        self.sink.info(&format!("Received: {}", ack.text()));
        if let Some(rejection) = ack.rejection() {
            self.sink
                .warn(&format!("Device rejected '{}': {:?}", ack.command, rejection));
        } else if !ack.confirmed {
            self.sink.warn(&format!(
                "No completion line for '{}' within {} ms",
                ack.command,
                timeout.as_millis()
            ));
        }
    }

    /// 关闭链路（幂等）
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("Servo link on {} closed", self.port);
            self.sink.info(&format!("Serial port {} closed", self.port));
        }
    }

    /// 链路是否打开
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// 端口名
    pub fn port_name(&self) -> &str {
        &self.port
    }
}

impl Drop for ServoLink {
    fn drop(&mut self) {
        self.close();
    }
}
