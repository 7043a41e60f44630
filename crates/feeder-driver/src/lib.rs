//! 驱动层模块
//!
//! 本模块提供喂食机械臂的 I/O 与共享状态，包括：
//! - 舵机串口链路（写指令 + 限时等待应答）
//! - 检测状态交换（ArcSwap 无锁读取）
//! - 检测线程（取帧 → 关键点推理 → 发布嘴部中心）
//! - 注入式日志汇
//!
//! # 使用场景
//!
//! 适用于需要直接收发舵机指令、或自行驱动检测流水线的场景。
//! 大多数用户应该使用 `feeder-client` 提供的控制器接口。

pub mod detection;
mod error;
pub mod link;
pub mod sink;
pub mod state;
pub mod thread;

pub use detection::{
    DetectionWorker, FaceLandmarks, Frame, FrameSource, LandmarkDetector,
    MOUTH_LANDMARK_INDICES, NormalizedPoint, compute_center, extract_mouth,
};
pub use error::{ConnectError, SendError, VisionError};
pub use link::{ServoAck, ServoLink};
pub use sink::{
    ChannelLogSink, LogLevel, LogRecord, LogSink, NullLogSink, SharedLogSink, TracingLogSink,
};
pub use state::{DetectionStateStore, FeatureDetection};
