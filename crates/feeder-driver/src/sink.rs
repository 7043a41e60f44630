//! 日志汇（Log Sink）
//!
//! 控制核心通过注入的 [`LogSink`] 报告面向用户的状态信息（发送的指令、应答、告警），
//! 不直接打印，也不依赖任何界面层。
//!
//! - [`TracingLogSink`]: 转发到 `tracing`（CLI 默认）
//! - [`ChannelLogSink`]: 写入 crossbeam channel，供界面日志面板消费
//! - [`NullLogSink`]: 丢弃全部消息
//!
//! # 使用示例
//!
//! ```rust
//! use feeder_driver::sink::{ChannelLogSink, LogLevel, LogSink};
//!
//! let (sink, rx) = ChannelLogSink::new(64);
//! sink.warn("No acknowledgement");
//!
//! let record = rx.try_recv().unwrap();
//! assert_eq!(record.level, LogLevel::Warn);
//! ```

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// 日志汇 Trait
///
/// # 性能要求
///
/// 实现不得阻塞调用线程：指令工作线程在串口事务中间调用此接口。
/// 需要跨线程转发时使用 `try_send`。
pub trait LogSink: Send + Sync {
    /// 记录一条消息
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// 共享日志汇
pub type SharedLogSink = Arc<dyn LogSink>;

/// 转发到 `tracing` 的日志汇
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl TracingLogSink {
    /// 包装为共享日志汇
    pub fn shared() -> SharedLogSink {
        Arc::new(Self)
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "feeder", "{}", message),
            LogLevel::Info => tracing::info!(target: "feeder", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "feeder", "{}", message),
            LogLevel::Error => tracing::error!(target: "feeder", "{}", message),
        }
    }
}

/// 丢弃全部消息的日志汇
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl NullLogSink {
    pub fn shared() -> SharedLogSink {
        Arc::new(Self)
    }
}

impl LogSink for NullLogSink {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// 一条带时间戳的日志记录
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    /// 单调时钟时间戳
    pub at: Instant,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// 写入有界 channel 的日志汇
///
/// 队列满时丢弃新消息并计数，不阻塞发送方。
#[derive(Debug)]
pub struct ChannelLogSink {
    sender: Sender<LogRecord>,
    dropped: AtomicU64,
}

impl ChannelLogSink {
    /// 创建日志汇及其接收端
    ///
    /// # 参数
    /// - `capacity`: 队列容量
    pub fn new(capacity: usize) -> (Self, Receiver<LogRecord>) {
        let (sender, receiver) = bounded(capacity);
        (
            Self {
                sender,
                dropped: AtomicU64::new(0),
            },
            receiver,
        )
    }

    /// 因队列满或接收端关闭而丢弃的消息数
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl LogSink for ChannelLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        let record = LogRecord {
            level,
            message: message.to_string(),
            at: Instant::now(),
        };
        match self.sender.try_send(record) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}
