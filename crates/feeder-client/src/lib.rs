//! 控制核心模块
//!
//! 本模块提供喂食机械臂的视觉伺服控制，包括：
//! - 嘴部像素位置到舵机角度的映射（绝对坐标映射、中心偏移映射）
//! - 机械臂状态机（初始化、单次喂食、动态跟踪、停止复位）
//! - 动作序列编排与单线程串行执行
//!
//! # 使用场景
//!
//! 这是大多数用户应该使用的模块：[`ArmController`] 持有串口链路与检测存储，
//! 所有动作请求立即返回 [`OperationHandle`]，序列在后台指令线程上执行。
//! 如果需要直接发送单条指令，可以使用 [`feeder_driver::ServoLink`]。

pub mod builder;
pub mod bus;
pub mod controller;
mod error;
pub mod mapping;
pub mod sequence;
pub mod state;
pub mod tracking;
mod worker;

// 重新导出常用类型
pub use builder::ArmControllerBuilder;
pub use bus::{LinkSlot, ServoBus};
pub use controller::{ArmController, ControllerStatus};
pub use error::ControllerError;
pub use mapping::{AbsoluteMapper, LinearMap, OffsetMapper};
pub use sequence::{Step, Tally};
pub use state::{ArmState, AtomicArmState};
pub use tracking::AngleGate;
pub use worker::{Operation, OperationHandle, OperationReport};
