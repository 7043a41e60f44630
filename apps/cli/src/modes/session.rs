//! 会话：控制器 + 连接参数 + 合成检测源
//!
//! One-shot 与 REPL 共用同一套建立方式。

use anyhow::{Context, Result};
use feeder_sdk::serial::MockDevice;
use feeder_sdk::{
    ArmController, CalibrationConfig, ControlFacade, FacadeReply, OperationReport, TracingLogSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::commands::{CliConfig, calibration_path};
use crate::synthetic::{SyntheticCamera, SyntheticDetector, SyntheticTarget};

/// 等待首个检测结果的上限
const DETECTION_WARMUP: Duration = Duration::from_secs(2);

/// 会话参数（命令行参数优先于配置文件）
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub calibration: Option<PathBuf>,
    pub simulate: bool,
    /// 合成检测目标（像素坐标）
    pub target: Option<(i32, i32)>,
}

/// 会话
pub struct Session {
    pub controller: Arc<ArmController>,
    pub facade: ControlFacade,
    pub target: SyntheticTarget,
    /// 模拟下位机（`--simulate`）
    pub device: Option<MockDevice>,
    pub cli_config: CliConfig,
    port: String,
    baud_rate: u32,
}

impl Session {
    /// 加载配置、创建控制器并启动合成检测线程
    pub fn open(options: &SessionOptions) -> Result<Self> {
        let cli_config = CliConfig::load()?;
        let path = calibration_path(options.calibration.as_deref())?;
        let calibration = CalibrationConfig::load_or_default(&path)
            .with_context(|| format!("加载标定文件失败: {}", path.display()))?;

        let port = options
            .port
            .clone()
            .or_else(|| cli_config.port.clone())
            .unwrap_or_else(|| calibration.link.port.clone());
        let baud_rate = options
            .baud_rate
            .or(cli_config.baud_rate)
            .unwrap_or(calibration.link.baud_rate);
        let (width, height) = (calibration.frame.width, calibration.frame.height);

        let controller = Arc::new(
            ArmController::builder()
                .config(calibration)
                .log_sink(TracingLogSink::shared())
                .build()?,
        );

        let target = SyntheticTarget::new(options.target);
        controller.attach_detection(
            Box::new(SyntheticCamera::new(width, height)),
            Box::new(SyntheticDetector::new(target.clone())),
        )?;

        Ok(Self {
            facade: ControlFacade::new(controller.clone()),
            controller,
            target,
            device: options.simulate.then(MockDevice::new),
            cli_config,
            port,
            baud_rate,
        })
    }

    /// 连接（模拟模式下连接到模拟下位机）
    pub fn connect(&self, port: Option<&str>, baud_rate: Option<u32>) -> Result<FacadeReply> {
        let reply = match &self.device {
            Some(device) => {
                let transport = device.transport().with_name("simulated");
                self.facade.connect_with(Box::new(transport))?
            },
            None => self.facade.connect(
                Some(port.unwrap_or(&self.port)),
                Some(baud_rate.unwrap_or(self.baud_rate)),
            )?,
        };
        Ok(reply)
    }

    /// 连接成功后是否自动初始化舵机
    pub fn set_auto_init(&mut self, auto_init: bool) {
        self.facade = self.facade.clone().with_auto_init(auto_init);
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// 等待检测线程发布首个"检测到"的快照
    pub fn wait_for_detection(&self) -> bool {
        let store = self.controller.detection_store();
        let deadline = Instant::now() + DETECTION_WARMUP;
        while Instant::now() < deadline {
            if store.snapshot().detected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

/// 打印操作结果
pub fn print_report(report: &OperationReport) {
    println!(
        "✅ {}: 发送 {} 条指令，{} 条未确认，耗时 {:.2?}",
        report.operation, report.sent, report.unconfirmed, report.elapsed
    );
}
