//! 指令线程
//!
//! 每个控制器只有一个长期存在的指令线程，按提交顺序逐个执行操作，
//! 因此任意时刻最多只有一个动作序列在占用串口。
//!
//! 提交方立即拿到 [`OperationHandle`]，不会被数秒长的序列阻塞；
//! 需要结果时再 `wait()` / `wait_timeout()`。

use crate::bus::{LinkSlot, ServoBus};
use crate::error::ControllerError;
use crate::mapping::{AbsoluteMapper, OffsetMapper};
use crate::sequence::{Tally, aim_sequence, rest_sequence, run_steps, send_one, single_feed_sequence};
use crate::state::{ArmState, AtomicArmState};
use crate::tracking::{TrackingContext, run_tracking};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, unbounded};
use feeder_driver::{DetectionStateStore, SharedLogSink};
use feeder_driver::thread::JoinTimeout;
use feeder_protocol::{ServoCommand, ServoId};
use feeder_tools::CalibrationConfig;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// 关闭时等待指令线程退出的上限
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 控制器操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// 初始化：全部舵机回到静止角度
    Initialize,
    /// 单次喂食
    SingleFeed,
    /// 动态跟踪（直到停止标志置位）
    DynamicTracking,
    /// 停止喂食并复位
    StopFeeding,
    /// 手动设置单个舵机
    ManualSet(ServoCommand),
    /// 按绝对坐标映射瞄准当前检测位置
    AimAtDetection,
}

impl Operation {
    /// 执行期间控制器所处的状态（手动设置与瞄准不改变状态）
    pub fn active_state(&self) -> Option<ArmState> {
        match self {
            Operation::Initialize => Some(ArmState::Initializing),
            Operation::SingleFeed => Some(ArmState::SingleFeed),
            Operation::DynamicTracking => Some(ArmState::DynamicTracking),
            Operation::StopFeeding => Some(ArmState::Stopping),
            Operation::ManualSet(_) | Operation::AimAtDetection => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Initialize => f.write_str("initialize"),
            Operation::SingleFeed => f.write_str("single feed"),
            Operation::DynamicTracking => f.write_str("dynamic tracking"),
            Operation::StopFeeding => f.write_str("stop feeding"),
            Operation::ManualSet(cmd) => {
                write!(f, "set servo {} to {}°", cmd.id(), cmd.angle())
            },
            Operation::AimAtDetection => f.write_str("aim at detection"),
        }
    }
}

/// 操作结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub operation: Operation,
    /// 已发送指令数
    pub sent: usize,
    /// 应答窗口内未确认的指令数
    pub unconfirmed: usize,
    /// 从开始执行到结束的耗时
    pub elapsed: Duration,
}

type OperationResult = Result<OperationReport, ControllerError>;

/// 已提交操作的句柄
#[derive(Debug)]
pub struct OperationHandle {
    operation: Operation,
    rx: Receiver<OperationResult>,
}

impl OperationHandle {
    /// 对应的操作
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// 阻塞直到操作结束
    ///
    /// # 错误
    /// - 操作本身的错误
    /// - `ControllerError::WorkerGone`: 指令线程在交付结果前退出
    pub fn wait(self) -> OperationResult {
        self.rx.recv().map_err(|_| ControllerError::WorkerGone)?
    }

    /// 最多等待 `timeout`；仍在执行时返回 `None`
    ///
    /// 结果只交付一次，取走后再次调用返回 `WorkerGone`。
    pub fn wait_timeout(&self, timeout: Duration) -> Option<OperationResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(ControllerError::WorkerGone)),
        }
    }

    /// 非阻塞查询
    pub fn try_result(&self) -> Option<OperationResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ControllerError::WorkerGone)),
        }
    }
}

/// 控制器与指令线程共享的运行时状态
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub state: AtomicArmState,
    /// 协作式停止标志（动态跟踪每周期检查）
    pub stop: AtomicBool,
    /// 已提交但未完成的操作数
    pub pending: AtomicUsize,
    pub link: LinkSlot,
}

impl Shared {
    fn finish_job(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.set_if_connected(ArmState::Idle);
        }
    }
}

/// 指令线程内的执行器
pub(crate) struct Runner {
    pub shared: Arc<Shared>,
    pub config: Arc<CalibrationConfig>,
    pub store: Arc<DetectionStateStore>,
    pub sink: SharedLogSink,
}

impl Runner {
    fn run(&self, operation: Operation) -> Result<Tally, ControllerError> {
        if !self.shared.link.is_connected() {
            return Err(ControllerError::NotConnected);
        }
        if let Some(state) = operation.active_state() {
            self.shared.state.set_if_connected(state);
        }

        let bus: &dyn ServoBus = &self.shared.link;
        let controller_ack = self.config.link.controller_ack();
        let exploratory_ack = self.config.link.exploratory_ack();

        match operation {
            Operation::Initialize => {
                self.sink.info("Initializing servos");
                run_steps(bus, &rest_sequence(&self.config), controller_ack, &self.sink)
            },
            Operation::SingleFeed => {
                let snapshot = self.store.snapshot();
                if !snapshot.detected {
                    self.sink.warn("No mouth detected, single feed aborted");
                    return Err(ControllerError::DetectionUnavailable);
                }

                let mapper = OffsetMapper::new(&self.config);
                let offset = mapper.offset(snapshot.center);
                let target = mapper.angles_for_offset(offset);
                self.sink.info(&format!(
                    "Mouth at ({}, {}), offset ({}, {}): servo 1 -> {}°, servo 2 -> {}°",
                    snapshot.center.0, snapshot.center.1, offset.0, offset.1, target.0, target.1
                ));
                run_steps(
                    bus,
                    &single_feed_sequence(&self.config, target),
                    controller_ack,
                    &self.sink,
                )
            },
            Operation::DynamicTracking => {
                self.sink.info("Dynamic tracking started");
                let mapper = OffsetMapper::new(&self.config);
                let ctx = TrackingContext {
                    bus,
                    store: &self.store,
                    mapper: &mapper,
                    config: &self.config,
                    sink: &self.sink,
                    stop: &self.shared.stop,
                    ack_timeout: controller_ack,
                };
                let tally = run_tracking(&ctx)?;
                self.sink.info("Dynamic tracking stopped");
                Ok(tally)
            },
            Operation::StopFeeding => {
                self.sink.info("Returning servos to rest position");
                run_steps(bus, &rest_sequence(&self.config), controller_ack, &self.sink)
            },
            Operation::ManualSet(command) => send_one(bus, command, exploratory_ack, &self.sink),
            Operation::AimAtDetection => {
                let snapshot = self.store.snapshot();
                if !snapshot.detected {
                    self.sink.warn("No mouth detected, nothing to aim at");
                    return Err(ControllerError::DetectionUnavailable);
                }

                let (x, y) = AbsoluteMapper::new(&self.config.coordinate_map).angles(snapshot.center);
                let target = (
                    ServoCommand::clamped(ServoId::Horizontal, x).angle(),
                    ServoCommand::clamped(ServoId::Vertical, y).angle(),
                );
                self.sink.info(&format!(
                    "Mouth at ({}, {}): servo 1 -> {}°, servo 2 -> {}°",
                    snapshot.center.0, snapshot.center.1, target.0, target.1
                ));
                run_steps(bus, &aim_sequence(target), exploratory_ack, &self.sink)
            },
        }
    }
}

struct Envelope {
    operation: Operation,
    reply: Sender<OperationResult>,
}

/// 指令线程句柄
pub(crate) struct CommandWorker {
    tx: Option<Sender<Envelope>>,
    handle: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl CommandWorker {
    pub fn spawn(runner: Runner) -> std::io::Result<Self> {
        let (tx, rx) = unbounded::<Envelope>();
        let shared = runner.shared.clone();

        let handle = std::thread::Builder::new()
            .name("feeder-cmd".to_string())
            .spawn(move || command_loop(runner, rx))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            shared,
        })
    }

    /// 提交操作（调用方负责准入判断）
    pub fn submit(&self, operation: Operation) -> Result<OperationHandle, ControllerError> {
        let tx = self.tx.as_ref().ok_or(ControllerError::WorkerGone)?;
        let (reply, rx) = bounded(1);

        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(Envelope { operation, reply }).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(ControllerError::WorkerGone);
        }
        Ok(OperationHandle { operation, rx })
    }

    /// 关闭线程：已排队的操作执行完毕后退出
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && let Err(_e) = handle.join_timeout(SHUTDOWN_JOIN_TIMEOUT)
        {
            error!(
                "Command worker panicked or failed to shut down within {:?}",
                SHUTDOWN_JOIN_TIMEOUT
            );
        }
    }
}

impl Drop for CommandWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn command_loop(runner: Runner, rx: Receiver<Envelope>) {
    debug!("Command worker started");

    for Envelope { operation, reply } in rx.iter() {
        let start = Instant::now();
        // 序列内的 panic 只终止本次操作，pending 仍要结算
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.run(operation)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!("{} panicked: {}", operation, reason);
                Err(ControllerError::OperationPanicked { operation, reason })
            },
        };
        let result = result.map(|tally| OperationReport {
            operation,
            sent: tally.sent,
            unconfirmed: tally.unconfirmed,
            elapsed: start.elapsed(),
        });

        match &result {
            Ok(report) => runner.sink.info(&format!(
                "Finished {}: {} commands sent, {} unconfirmed",
                operation, report.sent, report.unconfirmed
            )),
            Err(e) => runner.sink.warn(&format!("{} aborted: {}", operation, e)),
        }

        // 先结算状态再交付结果，等待方拿到结果时控制器已回到 Idle
        runner.shared.finish_job();
        let _ = reply.send(result);
    }

    debug!("Command worker exited");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_states() {
        assert_eq!(
            Operation::Initialize.active_state(),
            Some(ArmState::Initializing)
        );
        assert_eq!(
            Operation::StopFeeding.active_state(),
            Some(ArmState::Stopping)
        );
        assert_eq!(
            Operation::ManualSet(ServoCommand::new(ServoId::Wrist, 10)).active_state(),
            None
        );
    }

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = panic::catch_unwind(|| panic!("servo {}", 3)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "servo 3");
    }

    #[test]
    fn test_operation_display() {
        let op = Operation::ManualSet(ServoCommand::new(ServoId::Wrist, 10));
        assert_eq!(op.to_string(), "set servo 3 to 10°");
        assert_eq!(Operation::SingleFeed.to_string(), "single feed");
    }

    #[test]
    fn test_handle_reports_worker_gone() {
        let (tx, rx) = bounded::<OperationResult>(1);
        let handle = OperationHandle {
            operation: Operation::Initialize,
            rx,
        };
        assert!(handle.try_result().is_none());
        drop(tx);
        assert!(matches!(
            handle.wait_timeout(Duration::from_millis(10)),
            Some(Err(ControllerError::WorkerGone))
        ));
        assert!(matches!(handle.wait(), Err(ControllerError::WorkerGone)));
    }

    #[test]
    fn test_finish_job_settles_idle_only_when_drained() {
        let shared = Shared::default();
        shared.state.set(ArmState::SingleFeed);
        shared.pending.store(2, Ordering::SeqCst);

        shared.finish_job();
        assert_eq!(shared.state.get(), ArmState::SingleFeed);

        shared.finish_job();
        assert_eq!(shared.state.get(), ArmState::Idle);
    }

    #[test]
    fn test_finish_job_keeps_disconnected() {
        let shared = Shared::default();
        shared.pending.store(1, Ordering::SeqCst);
        shared.finish_job();
        assert_eq!(shared.state.get(), ArmState::Disconnected);
    }
}
