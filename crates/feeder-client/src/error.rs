//! 控制层错误类型定义

use crate::state::ArmState;
use crate::worker::Operation;
use feeder_driver::{ConnectError, SendError};
use feeder_protocol::{ProtocolError, ServoId};
use feeder_tools::ConfigError;
use thiserror::Error;

/// 控制器错误类型
///
/// 除 `Config` 外都可在本地恢复：失败后机械臂停留在 `Idle` 或原状态。
#[derive(Error, Debug)]
pub enum ControllerError {
    /// 串口打开失败，控制器保持 `Disconnected`
    #[error("Connect failed: {0}")]
    Connect(#[from] ConnectError),

    /// 序列中某个舵机指令发送失败，剩余步骤已中止
    #[error("Command to servo {servo} failed: {source}")]
    Send {
        servo: ServoId,
        #[source]
        source: SendError,
    },

    /// 当前快照未检测到嘴部，未执行任何动作
    #[error("No mouth detected in the current frame")]
    DetectionUnavailable,

    /// 手动输入非法（舵机 ID 或角度越界），未发送任何数据
    #[error("Invalid manual input: {0}")]
    InvalidInput(#[from] ProtocolError),

    /// 未连接
    #[error("Not connected")]
    NotConnected,

    /// 已连接
    #[error("Already connected to {port}")]
    AlreadyConnected { port: String },

    /// 已有序列在执行，拒绝新的状态切换
    #[error("Controller busy ({state})")]
    Busy { state: ArmState },

    /// 操作执行中 panic，已中止；指令线程继续服务后续请求
    #[error("{operation} panicked: {reason}")]
    OperationPanicked { operation: Operation, reason: String },

    /// 指令线程已退出
    #[error("Command worker is gone")]
    WorkerGone,

    /// 线程创建失败
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// 标定配置错误（启动时致命）
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ControllerError {
    /// 是否为发送前就被拒绝的请求（无任何串口传输）
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ControllerError::InvalidInput(_)
                | ControllerError::NotConnected
                | ControllerError::AlreadyConnected { .. }
                | ControllerError::Busy { .. }
        )
    }
}
