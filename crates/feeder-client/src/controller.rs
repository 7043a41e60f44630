//! 机械臂控制器
//!
//! [`ArmController`] 编排全部状态切换：连接、初始化、单次喂食、动态跟踪、停止复位。
//! 所有方法都只需 `&self`，可以放进 `Arc` 在 UI 线程与后台线程之间共享。
//!
//! # 并发与准入
//!
//! - 所有动作序列在同一个指令线程上串行执行。
//! - 非停止类请求（初始化、单次喂食、动态跟踪、手动设置、瞄准）在提交时原子地判断：
//!   已有操作在排队或执行时直接拒绝（`ControllerError::Busy`），不排队、不抢占。
//! - `stop_feeding` 总是被接受：置位停止标志（动态跟踪在下一周期退出），
//!   并把复位序列排在当前操作之后执行。
//! - `stop_tracking` 只置位停止标志，不回中。
//! - 未连接时所有动作请求返回 `ControllerError::NotConnected`。

use crate::builder::ArmControllerBuilder;
use crate::error::ControllerError;
use crate::state::ArmState;
use crate::worker::{CommandWorker, Operation, OperationHandle, Shared};
use feeder_driver::{
    DetectionStateStore, DetectionWorker, FeatureDetection, FrameSource, LandmarkDetector,
    ServoLink, SharedLogSink,
};
use feeder_protocol::ServoCommand;
use feeder_serial::SerialTransport;
use feeder_tools::CalibrationConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

/// 控制器状态概览
#[derive(Debug, Clone)]
pub struct ControllerStatus {
    pub state: ArmState,
    /// 已连接的端口
    pub port: Option<String>,
    /// 是否有操作在排队或执行
    pub busy: bool,
    /// 检测线程是否在运行
    pub detection_running: bool,
    /// 最新检测快照
    pub detection: FeatureDetection,
}

/// 机械臂控制器
pub struct ArmController {
    config: Arc<CalibrationConfig>,
    store: Arc<DetectionStateStore>,
    sink: SharedLogSink,
    shared: Arc<Shared>,
    worker: CommandWorker,
    detection: Mutex<Option<DetectionWorker>>,
    /// 准入锁：{读取状态, 判断, 提交} 作为一个整体
    transition: Mutex<()>,
}

impl ArmController {
    /// 创建 Builder
    pub fn builder() -> ArmControllerBuilder {
        ArmControllerBuilder::new()
    }

    /// 使用给定标定配置创建控制器（日志转发到 `tracing`）
    ///
    /// # 错误
    /// - `ControllerError::Config`: 标定配置校验失败
    /// - `ControllerError::Spawn`: 指令线程创建失败
    pub fn new(config: CalibrationConfig) -> Result<Self, ControllerError> {
        ArmControllerBuilder::new().config(config).build()
    }

    pub(crate) fn from_parts(
        config: Arc<CalibrationConfig>,
        store: Arc<DetectionStateStore>,
        sink: SharedLogSink,
        shared: Arc<Shared>,
        worker: CommandWorker,
    ) -> Self {
        Self {
            config,
            store,
            sink,
            shared,
            worker,
            detection: Mutex::new(None),
            transition: Mutex::new(()),
        }
    }

    // ==================== 连接管理 ====================

    /// 打开串口并进入 `Idle`
    ///
    /// # 参数
    /// - `port`: 端口路径
    /// - `baud_rate`: 波特率
    ///
    /// # 错误
    /// - `ControllerError::AlreadyConnected`: 已连接
    /// - `ControllerError::Busy`: 断开前提交的操作尚未结束
    /// - `ControllerError::Connect`: 串口不可用，保持 `Disconnected`
    #[cfg(feature = "native")]
    pub fn connect(&self, port: &str, baud_rate: u32) -> Result<(), ControllerError> {
        let _guard = self.transition.lock();
        self.check_can_connect()?;

        match ServoLink::connect(port, baud_rate, self.sink.clone()) {
            Ok(link) => self.install(link),
            Err(e) => {
                self.sink.error(&format!("Connection failed: {}", e));
                Err(e.into())
            },
        }
    }

    /// 使用已打开的传输连接（mock 传输或自定义后端）
    ///
    /// # 错误
    /// 同 [`connect`](Self::connect)
    pub fn connect_with(&self, transport: Box<dyn SerialTransport>) -> Result<(), ControllerError> {
        let _guard = self.transition.lock();
        self.check_can_connect()?;

        match ServoLink::with_transport(transport, self.sink.clone()) {
            Ok(link) => self.install(link),
            Err(e) => {
                self.sink.error(&format!("Connection failed: {}", e));
                Err(e.into())
            },
        }
    }

    fn check_can_connect(&self) -> Result<(), ControllerError> {
        if let Some(port) = self.shared.link.port_name() {
            return Err(ControllerError::AlreadyConnected { port });
        }
        if self.shared.pending.load(Ordering::Acquire) > 0 {
            return Err(ControllerError::Busy {
                state: self.shared.state.get(),
            });
        }
        Ok(())
    }

    fn install(&self, link: ServoLink) -> Result<(), ControllerError> {
        let port = link.port_name().to_string();
        if let Err(link) = self.shared.link.install(link) {
            return Err(ControllerError::AlreadyConnected {
                port: link.port_name().to_string(),
            });
        }
        self.shared.stop.store(false, Ordering::Release);
        self.shared.state.set(ArmState::Idle);
        info!("Arm controller connected on {}", port);
        Ok(())
    }

    /// 关闭串口，进入 `Disconnected`（幂等）
    ///
    /// 同时置位停止标志；已排队的操作会以 `NotConnected` 结束。
    /// 返回是否确有连接被关闭。
    pub fn disconnect(&self) -> bool {
        let _guard = self.transition.lock();
        self.shared.stop.store(true, Ordering::Release);
        let closed = self.shared.link.close();
        self.shared.state.set(ArmState::Disconnected);
        if closed {
            info!("Arm controller disconnected");
        }
        closed
    }

    // ==================== 状态切换 ====================

    /// 初始化：舵机 1-4 依次回到静止角度（间隔 0.3s）
    ///
    /// 任意指令失败即中止剩余步骤并报告失败的舵机；已生效的角度不回滚。
    pub fn init_servos(&self) -> Result<OperationHandle, ControllerError> {
        self.submit_transition(Operation::Initialize)
    }

    /// 单次喂食
    ///
    /// 执行时读取一次检测快照；未检测到嘴部时不发送任何指令，
    /// 句柄返回 `ControllerError::DetectionUnavailable`。
    pub fn start_single_feed(&self) -> Result<OperationHandle, ControllerError> {
        self.submit_transition(Operation::SingleFeed)
    }

    /// 开始动态跟踪（直到 `stop_tracking` / `stop_feeding`）
    pub fn start_dynamic_tracking(&self) -> Result<OperationHandle, ControllerError> {
        self.submit_transition(Operation::DynamicTracking)
    }

    /// 停止动态跟踪，不回中
    ///
    /// 返回当前是否处于动态跟踪。
    pub fn stop_tracking(&self) -> bool {
        self.shared.stop.store(true, Ordering::Release);
        let tracking = self.shared.state.get() == ArmState::DynamicTracking;
        if tracking {
            self.sink.info("Stopping dynamic tracking");
        }
        tracking
    }

    /// 停止喂食并复位到静止姿态（任何已连接状态下都可调用）
    ///
    /// # 错误
    /// - `ControllerError::NotConnected`: 未连接
    pub fn stop_feeding(&self) -> Result<OperationHandle, ControllerError> {
        let _guard = self.transition.lock();
        if !self.shared.state.get().is_connected() {
            return Err(ControllerError::NotConnected);
        }

        self.shared.stop.store(true, Ordering::Release);
        self.sink.info("Stop requested");
        self.worker.submit(Operation::StopFeeding)
    }

    /// 手动设置单个舵机（应答窗口 0.5s）
    ///
    /// # 参数
    /// - `servo_id`: 舵机 ID（1-4）
    /// - `angle`: 角度（0-180）
    ///
    /// # 错误
    /// - `ControllerError::InvalidInput`: ID 或角度越界，同步拒绝，不发送任何数据
    /// - `ControllerError::NotConnected` / `ControllerError::Busy`
    pub fn set_servo(&self, servo_id: i64, angle: i64) -> Result<OperationHandle, ControllerError> {
        let command = ServoCommand::try_from_raw(servo_id, angle)?;
        self.sink.info(&format!(
            "Manual set servo {} to {}°",
            command.id(),
            command.angle()
        ));
        self.submit_transition(Operation::ManualSet(command))
    }

    /// 按绝对坐标映射把舵机 1、2 对准当前检测位置（应答窗口 0.5s）
    pub fn aim_at_detection(&self) -> Result<OperationHandle, ControllerError> {
        self.submit_transition(Operation::AimAtDetection)
    }

    fn submit_transition(&self, operation: Operation) -> Result<OperationHandle, ControllerError> {
        let _guard = self.transition.lock();

        let state = self.shared.state.get();
        if !state.is_connected() {
            return Err(ControllerError::NotConnected);
        }
        if self.shared.pending.load(Ordering::Acquire) > 0 {
            debug!("Rejected {} while {}", operation, state);
            return Err(ControllerError::Busy { state });
        }

        if operation == Operation::DynamicTracking {
            self.shared.stop.store(false, Ordering::Release);
        }
        if let Some(next) = operation.active_state() {
            self.shared.state.set(next);
        }
        self.worker.submit(operation)
    }

    // ==================== 检测 ====================

    /// 启动检测线程，发布到本控制器的检测存储
    ///
    /// 已有检测线程时先停止旧线程。
    ///
    /// # 错误
    /// - `ControllerError::Spawn`: 线程创建失败
    pub fn attach_detection(
        &self,
        source: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkDetector>,
    ) -> Result<(), ControllerError> {
        let mut slot = self.detection.lock();
        if let Some(mut previous) = slot.take() {
            previous.stop();
        }

        let worker =
            DetectionWorker::spawn(source, detector, self.store.clone(), self.sink.clone())
                .map_err(ControllerError::Spawn)?;
        *slot = Some(worker);
        self.sink.info("Detection started");
        Ok(())
    }

    /// 停止检测线程并释放相机（幂等）
    pub fn detach_detection(&self) -> bool {
        match self.detection.lock().take() {
            Some(mut worker) => {
                worker.stop();
                self.sink.info("Detection stopped");
                true
            },
            None => false,
        }
    }

    // ==================== 清理 ====================

    /// 释放全部资源（任何状态下可调用，幂等）
    ///
    /// 有动作在执行时先执行 `stop_feeding` 并等待复位完成，
    /// 然后停止检测线程、关闭串口。
    pub fn cleanup(&self) {
        let active = self.shared.state.get().is_active()
            || self.shared.pending.load(Ordering::Acquire) > 0;

        if active && self.shared.link.is_connected() {
            match self.stop_feeding() {
                Ok(handle) => {
                    if let Err(e) = handle.wait() {
                        warn!("Reset during cleanup failed: {}", e);
                    }
                },
                Err(e) => warn!("Could not reset during cleanup: {}", e),
            }
        }

        self.detach_detection();
        if self.disconnect() {
            self.sink.info("Cleanup complete");
        }
    }

    // ==================== 查询 ====================

    /// 当前状态
    pub fn state(&self) -> ArmState {
        self.shared.state.get()
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.shared.link.is_connected()
    }

    /// 是否有操作在排队或执行
    pub fn is_busy(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire) > 0
    }

    /// 标定配置
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// 检测存储（外部检测流水线可以直接发布到这里）
    pub fn detection_store(&self) -> Arc<DetectionStateStore> {
        self.store.clone()
    }

    /// 日志汇
    pub fn sink(&self) -> &SharedLogSink {
        &self.sink
    }

    /// 状态概览
    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.state(),
            port: self.shared.link.port_name(),
            busy: self.is_busy(),
            detection_running: self
                .detection
                .lock()
                .as_ref()
                .is_some_and(DetectionWorker::is_running),
            detection: self.store.snapshot(),
        }
    }
}

impl Drop for ArmController {
    fn drop(&mut self) {
        // 结束跟踪循环，让指令线程能够退出
        self.shared.stop.store(true, Ordering::Release);
        self.worker.shutdown();
        self.detach_detection();
    }
}
