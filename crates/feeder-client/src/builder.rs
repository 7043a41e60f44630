//! 控制器 Builder

use crate::controller::ArmController;
use crate::error::ControllerError;
use crate::worker::{CommandWorker, Runner, Shared};
use feeder_driver::{DetectionStateStore, SharedLogSink, TracingLogSink};
use feeder_tools::CalibrationConfig;
use std::sync::Arc;
use tracing::debug;

/// 控制器 Builder
///
/// # 示例
///
/// ```rust,no_run
/// use feeder_client::ArmControllerBuilder;
/// use feeder_tools::CalibrationConfig;
///
/// let controller = ArmControllerBuilder::new()
///     .config(CalibrationConfig::default())
///     .build()?;
/// controller.connect("/dev/ttyUSB0", 115200)?;
/// controller.init_servos()?.wait()?;
/// # Ok::<(), feeder_client::ControllerError>(())
/// ```
pub struct ArmControllerBuilder {
    config: CalibrationConfig,
    sink: Option<SharedLogSink>,
    store: Option<Arc<DetectionStateStore>>,
}

impl ArmControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: CalibrationConfig::default(),
            sink: None,
            store: None,
        }
    }

    /// 设置标定配置（默认为 [`CalibrationConfig::default`]）
    pub fn config(mut self, config: CalibrationConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置日志汇（默认转发到 `tracing`）
    pub fn log_sink(mut self, sink: SharedLogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 使用外部检测存储（默认新建）
    ///
    /// 外部检测流水线可以先创建存储并持续发布，再交给控制器读取。
    pub fn detection_store(mut self, store: Arc<DetectionStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 校验配置并启动指令线程
    ///
    /// # 错误
    /// - `ControllerError::Config`: 标定配置非法
    /// - `ControllerError::Spawn`: 指令线程创建失败
    pub fn build(self) -> Result<ArmController, ControllerError> {
        self.config.validate()?;

        let config = Arc::new(self.config);
        let store = self.store.unwrap_or_else(DetectionStateStore::shared);
        let sink = self.sink.unwrap_or_else(TracingLogSink::shared);
        let shared = Arc::new(Shared::default());

        let worker = CommandWorker::spawn(Runner {
            shared: shared.clone(),
            config: config.clone(),
            store: store.clone(),
            sink: sink.clone(),
        })
        .map_err(ControllerError::Spawn)?;
        debug!("Arm controller built");

        Ok(ArmController::from_parts(config, store, sink, shared, worker))
    }
}

impl Default for ArmControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
