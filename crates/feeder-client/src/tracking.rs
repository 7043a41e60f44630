//! 动态跟踪
//!
//! 跟踪循环每个周期（默认 100ms）读取一次检测快照，计算舵机 1、2 的目标角度，
//! 只有与上次发送角度相差不小于阈值（默认 2°）的舵机才会发送指令。
//!
//! 取消是协作式的：循环在每个周期开头检查停止标志，不会打断进行中的串口事务。
//! 停止后直接退出，不自动回中；回中只能通过 `stop_feeding`。

use crate::bus::ServoBus;
use crate::error::ControllerError;
use crate::mapping::OffsetMapper;
use crate::sequence::{Tally, run_steps, send_one, tracking_preamble};
use feeder_driver::{DetectionStateStore, SharedLogSink};
use feeder_protocol::{ServoCommand, ServoId};
use feeder_tools::CalibrationConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// 角度变化门限（迟滞）
///
/// 首个目标总是放行；之后只有与上次发送角度相差 `>= threshold` 时放行。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AngleGate {
    threshold: u8,
    last: Option<u8>,
}

impl AngleGate {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            last: None,
        }
    }

    /// 目标角度是否需要发送
    pub fn should_send(&self, target: u8) -> bool {
        match self.last {
            None => true,
            Some(last) => last.abs_diff(target) >= self.threshold,
        }
    }

    /// 记录已发送的角度
    pub fn record(&mut self, angle: u8) {
        self.last = Some(angle);
    }

    /// 上次发送的角度
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

/// 跟踪循环的依赖
pub struct TrackingContext<'a> {
    pub bus: &'a dyn ServoBus,
    pub store: &'a DetectionStateStore,
    pub mapper: &'a OffsetMapper,
    pub config: &'a CalibrationConfig,
    pub sink: &'a SharedLogSink,
    pub stop: &'a AtomicBool,
    pub ack_timeout: Duration,
}

/// 运行跟踪循环直到停止标志置位
///
/// # 错误
/// - `ControllerError::Send`: 前置动作或跟踪指令发送失败，循环退出
pub fn run_tracking(ctx: &TrackingContext<'_>) -> Result<Tally, ControllerError> {
    let mut tally = run_steps(
        ctx.bus,
        &tracking_preamble(ctx.config),
        ctx.ack_timeout,
        ctx.sink,
    )?;

    let threshold = ctx.config.tracking.threshold_deg;
    let mut horizontal = AngleGate::new(threshold);
    let mut vertical = AngleGate::new(threshold);
    let period = ctx.config.tracking.period();
    let mut ticks: u64 = 0;

    while !ctx.stop.load(Ordering::Acquire) {
        ticks += 1;
        let snapshot = ctx.store.snapshot();

        if snapshot.detected {
            let (h, v) = ctx.mapper.angles_for_center(snapshot.center);
            for (gate, id, angle) in [
                (&mut horizontal, ServoId::Horizontal, h),
                (&mut vertical, ServoId::Vertical, v),
            ] {
                if gate.should_send(angle) {
                    let command = ServoCommand::new(id, angle);
                    tally.merge(send_one(ctx.bus, command, ctx.ack_timeout, ctx.sink)?);
                    gate.record(angle);
                }
            }
        }

        spin_sleep::sleep(period);
    }

    debug!(
        "Tracking loop stopped after {} ticks, {} commands sent",
        ticks, tally.sent
    );
    Ok(tally)
}
