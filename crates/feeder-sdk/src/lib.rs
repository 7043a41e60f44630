//! Feeder SDK - 视觉伺服喂食机械臂 Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): `set_servo_angle` 指令编码与下位机应答解析
//! - **传输层** (`serial`): 串口传输抽象，支持真实串口与模拟下位机
//! - **驱动层** (`driver`): 舵机链路、检测状态交换、检测线程
//! - **客户端层** (`client`): 角度映射、状态机、动作序列
//! - **门面** ([`ControlFacade`]): 连接管理与文本指令分发
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use feeder_sdk::{ArmController, ControlFacade, init_logger};
//! use std::sync::Arc;
//!
//! init_logger();
//! let controller = Arc::new(ArmController::builder().build()?);
//! let facade = ControlFacade::new(controller.clone()).with_auto_init(true);
//! facade.connect(Some("/dev/ttyUSB0"), Some(115200))?;
//! controller.start_dynamic_tracking()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod facade;
pub mod logging;

pub use feeder_client as client;
pub use feeder_driver as driver;
pub use feeder_protocol as protocol;
pub use feeder_serial as serial;
pub use feeder_tools as tools;

// --- 用户以此为界 ---

pub use facade::{ControlFacade, FacadeCommand, FacadeError, FacadeReply, HELP};
pub use logging::{init_logger, init_logger_with};

pub use feeder_client::{
    ArmController, ArmControllerBuilder, ArmState, ControllerError, ControllerStatus, Operation,
    OperationHandle, OperationReport,
};
pub use feeder_driver::{
    ChannelLogSink, DetectionStateStore, FeatureDetection, FrameSource, LandmarkDetector,
    LogLevel, LogSink, NullLogSink, SharedLogSink, TracingLogSink,
};
pub use feeder_protocol::{ProtocolError, ServoCommand, ServoId};
pub use feeder_tools::{CalibrationConfig, ConfigError};

/// Prelude 模块
pub mod prelude {
    pub use crate::{
        ArmController, ArmState, CalibrationConfig, ControlFacade, ControllerError,
        FeatureDetection, ServoId, init_logger,
    };
}
