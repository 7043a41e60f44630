//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置
//! 2. 连接下位机
//! 3. 执行操作
//! 4. 复位（如需要）并断开连接

use anyhow::Result;
use feeder_sdk::driver::ServoLink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub use super::session::SessionOptions;
use super::session::{Session, print_report};

/// One-shot 模式
pub struct OneShotMode {
    session: Session,
}

impl OneShotMode {
    /// 建立会话并连接
    pub fn new(options: SessionOptions) -> Result<Self> {
        let session = Session::open(&options)?;

        println!("⏳ 连接到 {} ...", Self::describe(&session, &options));
        session.connect(None, None)?;
        println!("✅ 已连接");

        if options.target.is_some() && !session.wait_for_detection() {
            println!("⚠️  合成检测尚未产出结果");
        }

        Ok(Self { session })
    }

    fn describe(session: &Session, options: &SessionOptions) -> String {
        if options.simulate {
            "模拟下位机".to_string()
        } else {
            format!("{} @ {}", session.port(), session.baud_rate())
        }
    }

    /// 全部舵机回到静止姿态
    pub fn init(&self) -> Result<()> {
        println!("⏳ 初始化舵机...");
        let report = self.session.controller.init_servos()?.wait()?;
        print_report(&report);
        Ok(())
    }

    /// 手动设置单个舵机
    pub fn set(&self, servo_id: i64, angle: i64) -> Result<()> {
        let report = self.session.controller.set_servo(servo_id, angle)?.wait()?;
        print_report(&report);
        Ok(())
    }

    /// 单次喂食
    pub fn feed(&self) -> Result<()> {
        println!("⏳ 单次喂食...");
        let report = self.session.controller.start_single_feed()?.wait()?;
        print_report(&report);
        Ok(())
    }

    /// 按绝对映射瞄准
    pub fn aim(&self) -> Result<()> {
        let report = self.session.controller.aim_at_detection()?.wait()?;
        print_report(&report);
        Ok(())
    }

    /// 停止喂食并复位
    pub fn stop(&self) -> Result<()> {
        println!("🛑 停止喂食，复位中...");
        let report = self.session.controller.stop_feeding()?.wait()?;
        print_report(&report);
        Ok(())
    }

    /// 动态跟踪，直到 Ctrl+C 或时长耗尽，随后复位
    pub fn track(&self, duration: Option<Duration>) -> Result<()> {
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

        let controller = &self.session.controller;
        let tracking = controller.start_dynamic_tracking()?;
        println!("🎯 动态跟踪中（Ctrl+C 停止）...");

        let start = Instant::now();
        loop {
            if interrupted.load(Ordering::SeqCst) {
                println!("\n🛑 收到 Ctrl+C");
                break;
            }
            if duration.is_some_and(|d| start.elapsed() >= d) {
                break;
            }
            if let Some(result) = tracking.wait_timeout(Duration::from_millis(50)) {
                // 跟踪提前结束（发送失败等）
                print_report(&result?);
                return Ok(());
            }
        }

        let stop = controller.stop_feeding()?;
        print_report(&tracking.wait()?);
        print_report(&stop.wait()?);
        Ok(())
    }
}

impl Drop for OneShotMode {
    fn drop(&mut self) {
        self.session.controller.cleanup();
    }
}

/// 列出可用串口
pub fn list_ports() -> Result<()> {
    let ports = feeder_sdk::serial::available_ports()?;
    if ports.is_empty() {
        println!("(未发现串口)");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

/// 测试串口能否打开
pub fn probe(options: &SessionOptions) -> Result<()> {
    if options.simulate {
        println!("✅ 模拟下位机可用");
        return Ok(());
    }

    let session = Session::open(options)?;
    ServoLink::probe(session.port(), session.baud_rate())?;
    println!("✅ 串口 {} 可以打开", session.port());
    Ok(())
}
