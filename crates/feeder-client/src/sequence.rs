//! 动作序列
//!
//! 序列是有序的 [`Step`] 列表：舵机指令与固定等待交替出现。
//! 等待用于舵机机械到位，属于行为的一部分：调整顺序或删除等待都会改变行为。
//!
//! 执行器严格按顺序执行；任意一条指令发送失败即中止剩余步骤并报告失败的舵机，
//! 已执行的动作不回滚。

use crate::bus::ServoBus;
use crate::error::ControllerError;
use feeder_driver::SharedLogSink;
use feeder_protocol::{ServoCommand, ServoId};
use feeder_tools::CalibrationConfig;
use std::time::Duration;

/// 序列步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// 发送舵机指令
    Move(ServoCommand),
    /// 等待
    Wait(Duration),
}

impl Step {
    fn servo(id: ServoId, angle: u8) -> Self {
        Step::Move(ServoCommand::new(id, angle))
    }
}

/// 执行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// 已发送指令数
    pub sent: usize,
    /// 应答窗口内未确认的指令数
    pub unconfirmed: usize,
}

impl Tally {
    pub fn merge(&mut self, other: Tally) {
        self.sent += other.sent;
        self.unconfirmed += other.unconfirmed;
    }
}

/// 初始化 / 复位序列：舵机 1-4 依次回到静止角度，相邻指令间隔 `reset_step`
pub fn rest_sequence(config: &CalibrationConfig) -> Vec<Step> {
    let gap = config.timing.reset_step();
    let mut steps = Vec::with_capacity(ServoId::ALL.len() * 2 - 1);
    for (i, id) in ServoId::ALL.into_iter().enumerate() {
        if i > 0 {
            steps.push(Step::Wait(gap));
        }
        steps.push(Step::servo(id, config.pose.rest_angle(id)));
    }
    steps
}

/// 单次喂食序列
///
/// 舵机 1 → 等待 → 舵机 2 → 等待 → （腕部保持不动）→ 等待 → 舵机 4 到喂食角度
pub fn single_feed_sequence(config: &CalibrationConfig, target: (u8, u8)) -> Vec<Step> {
    vec![
        Step::servo(ServoId::Horizontal, target.0),
        Step::Wait(config.timing.horizontal_settle()),
        Step::servo(ServoId::Vertical, target.1),
        Step::Wait(config.timing.vertical_settle()),
        Step::Wait(config.timing.feed_delay()),
        Step::servo(ServoId::Feeder, config.pose.feed_angle),
    ]
}

/// 动态跟踪前置动作：腕部到待喂角度，喂食舵机到喂食角度
pub fn tracking_preamble(config: &CalibrationConfig) -> Vec<Step> {
    vec![
        Step::servo(ServoId::Wrist, config.pose.wrist_feed_ready),
        Step::servo(ServoId::Feeder, config.pose.feed_angle),
    ]
}

/// 绝对瞄准：舵机 1、2 直接设置到目标角度
pub fn aim_sequence(target: (u8, u8)) -> Vec<Step> {
    vec![
        Step::servo(ServoId::Horizontal, target.0),
        Step::servo(ServoId::Vertical, target.1),
    ]
}

/// 按顺序执行序列
///
/// # 参数
/// - `bus`: 舵机总线
/// - `steps`: 步骤列表
/// - `ack_timeout`: 每条指令的应答窗口
/// - `sink`: 日志汇
///
/// # 错误
/// - `ControllerError::Send`: 第一条失败的指令，剩余步骤未执行
pub fn run_steps(
    bus: &dyn ServoBus,
    steps: &[Step],
    ack_timeout: Duration,
    sink: &SharedLogSink,
) -> Result<Tally, ControllerError> {
    let mut tally = Tally::default();

    for step in steps {
        match *step {
            Step::Move(command) => {
                tally.merge(send_one(bus, command, ack_timeout, sink)?);
            },
            Step::Wait(duration) => spin_sleep::sleep(duration),
        }
    }
    Ok(tally)
}

/// 发送单条指令
///
/// # 错误
/// - `ControllerError::Send`: 发送失败（已记录到日志汇）
pub fn send_one(
    bus: &dyn ServoBus,
    command: ServoCommand,
    ack_timeout: Duration,
    sink: &SharedLogSink,
) -> Result<Tally, ControllerError> {
    match bus.send(command, ack_timeout) {
        Ok(ack) => Ok(Tally {
            sent: 1,
            unconfirmed: usize::from(!ack.confirmed),
        }),
        Err(source) => {
            sink.error(&format!(
                "Servo {} command failed: {}",
                command.id(),
                source
            ));
            Err(ControllerError::Send {
                servo: command.id(),
                source,
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeder_driver::{NullLogSink, SendError, ServoAck};
    use parking_lot::Mutex;
    use std::time::Instant;

    /// 记录发送顺序，可在指定舵机上失败
    #[derive(Default)]
    struct RecordingBus {
        sent: Mutex<Vec<(ServoCommand, Instant)>>,
        fail_on: Option<ServoId>,
        silent: bool,
    }

    fn ack(command: ServoCommand, confirmed: bool) -> ServoAck {
        ServoAck {
            command,
            lines: Default::default(),
            confirmed,
            elapsed: Duration::ZERO,
        }
    }

    impl ServoBus for RecordingBus {
        fn send(&self, command: ServoCommand, _timeout: Duration) -> Result<ServoAck, SendError> {
            if self.fail_on == Some(command.id()) {
                return Err(SendError::Closed);
            }
            self.sent.lock().push((command, Instant::now()));
            Ok(ack(command, !self.silent))
        }
    }

    fn quick_config() -> CalibrationConfig {
        let mut config = CalibrationConfig::default();
        config.timing.horizontal_settle_s = 0.02;
        config.timing.vertical_settle_s = 0.02;
        config.timing.feed_delay_s = 0.04;
        config.timing.reset_step_s = 0.01;
        config
    }

    #[test]
    fn test_rest_sequence_layout() {
        let config = CalibrationConfig::default();
        let steps = rest_sequence(&config);
        assert_eq!(
            steps,
            vec![
                Step::servo(ServoId::Horizontal, 120),
                Step::Wait(Duration::from_millis(300)),
                Step::servo(ServoId::Vertical, 45),
                Step::Wait(Duration::from_millis(300)),
                Step::servo(ServoId::Wrist, 90),
                Step::Wait(Duration::from_millis(300)),
                Step::servo(ServoId::Feeder, 90),
            ]
        );
    }

    #[test]
    fn test_single_feed_sequence_layout() {
        let config = CalibrationConfig::default();
        let steps = single_feed_sequence(&config, (106, 45));
        assert_eq!(
            steps,
            vec![
                Step::servo(ServoId::Horizontal, 106),
                Step::Wait(Duration::from_millis(500)),
                Step::servo(ServoId::Vertical, 45),
                Step::Wait(Duration::from_millis(500)),
                Step::Wait(Duration::from_secs(1)),
                Step::servo(ServoId::Feeder, 0),
            ]
        );
        // 腕部舵机不在序列中
        assert!(!steps
            .iter()
            .any(|s| matches!(s, Step::Move(c) if c.id() == ServoId::Wrist)));
    }

    #[test]
    fn test_run_steps_in_order_with_delays() {
        let config = quick_config();
        let bus = RecordingBus::default();
        let sink = NullLogSink::shared();

        let tally = run_steps(
            &bus,
            &single_feed_sequence(&config, (100, 50)),
            Duration::from_millis(10),
            &sink,
        )
        .unwrap();
        assert_eq!(tally, Tally { sent: 3, unconfirmed: 0 });

        let sent = bus.sent.lock();
        let ids: Vec<_> = sent.iter().map(|(c, _)| c.id()).collect();
        assert_eq!(ids, vec![ServoId::Horizontal, ServoId::Vertical, ServoId::Feeder]);
        assert!(sent[1].1 - sent[0].1 >= Duration::from_millis(20));
        assert!(sent[2].1 - sent[1].1 >= Duration::from_millis(60));
    }

    #[test]
    fn test_run_steps_aborts_on_first_failure() {
        let config = quick_config();
        let bus = RecordingBus {
            fail_on: Some(ServoId::Vertical),
            ..Default::default()
        };
        let sink = NullLogSink::shared();

        let err = run_steps(
            &bus,
            &rest_sequence(&config),
            Duration::from_millis(10),
            &sink,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Send {
                servo: ServoId::Vertical,
                ..
            }
        ));
        // 舵机 1 已执行，3、4 未执行
        assert_eq!(bus.sent.lock().len(), 1);
    }

    #[test]
    fn test_unconfirmed_sends_are_counted() {
        let bus = RecordingBus {
            silent: true,
            ..Default::default()
        };
        let sink = NullLogSink::shared();
        let tally = run_steps(
            &bus,
            &aim_sequence((90, 90)),
            Duration::from_millis(10),
            &sink,
        )
        .unwrap();
        assert_eq!(tally, Tally { sent: 2, unconfirmed: 2 });
    }
}
