//! 控制器集成测试（模拟下位机）

use feeder_client::{ArmController, ArmState, ControllerError, Operation};
use feeder_driver::{ChannelLogSink, FeatureDetection, LogLevel, NullLogSink};
use feeder_protocol::{ServoCommand, ServoId};
use feeder_serial::MockDevice;
use feeder_tools::CalibrationConfig;
use serial_test::serial;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

/// 缩短时序的标定配置（等待为零，应答窗口 200ms）
fn fast_config() -> CalibrationConfig {
    let mut config = CalibrationConfig::default();
    config.timing.horizontal_settle_s = 0.0;
    config.timing.vertical_settle_s = 0.0;
    config.timing.feed_delay_s = 0.0;
    config.timing.reset_step_s = 0.0;
    config.tracking.period_ms = 10;
    config.link.controller_ack_ms = 200;
    config.link.exploratory_ack_ms = 100;
    config
}

fn connected() -> (ArmController, MockDevice) {
    let controller = ArmController::builder()
        .config(fast_config())
        .log_sink(NullLogSink::shared())
        .build()
        .unwrap();
    let device = MockDevice::new();
    controller.connect_with(Box::new(device.transport())).unwrap();
    (controller, device)
}

fn publish(controller: &ArmController, center: (i32, i32)) {
    let store = controller.detection_store();
    let index = store.frame_index() + 1;
    store.publish(FeatureDetection::found(center, vec![center], index));
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn count_for(device: &MockDevice, id: ServoId) -> usize {
    device.commands().iter().filter(|c| c.id() == id).count()
}

fn rest_angles() -> [Option<u8>; 4] {
    [Some(120), Some(45), Some(90), Some(90)]
}

// ==================== 连接 ====================

#[test]
fn test_requests_rejected_when_disconnected() {
    let controller = ArmController::new(fast_config()).unwrap();
    assert_eq!(controller.state(), ArmState::Disconnected);

    assert!(matches!(
        controller.init_servos(),
        Err(ControllerError::NotConnected)
    ));
    assert!(matches!(
        controller.start_single_feed(),
        Err(ControllerError::NotConnected)
    ));
    assert!(matches!(
        controller.stop_feeding(),
        Err(ControllerError::NotConnected)
    ));
    assert!(matches!(
        controller.set_servo(1, 90),
        Err(ControllerError::NotConnected)
    ));
}

#[test]
fn test_connect_twice_is_rejected() {
    let (controller, _device) = connected();
    assert_eq!(controller.state(), ArmState::Idle);

    let other = MockDevice::new();
    let err = controller
        .connect_with(Box::new(other.transport().with_name("second")))
        .unwrap_err();
    assert!(matches!(err, ControllerError::AlreadyConnected { ref port } if port == "mock"));
    assert!(other.written_lines().is_empty());
}

#[test]
fn test_connect_clears_input_buffer() {
    let controller = ArmController::new(fast_config()).unwrap();
    let device = MockDevice::new();
    device.inject_line("msh >");
    controller.connect_with(Box::new(device.transport())).unwrap();
    assert_eq!(device.clear_count(), 1);
    assert_eq!(device.pending_lines(), 0);
}

#[test]
fn test_disconnect_is_idempotent() {
    let (controller, _device) = connected();
    assert!(controller.disconnect());
    assert!(!controller.disconnect());
    assert_eq!(controller.state(), ArmState::Disconnected);
    assert!(controller.status().port.is_none());
}

// ==================== 初始化 ====================

#[test]
fn test_init_servos_sends_rest_pose_in_order() {
    let (controller, device) = connected();

    let report = controller.init_servos().unwrap().wait().unwrap();
    assert_eq!(report.operation, Operation::Initialize);
    assert_eq!(report.sent, 4);
    assert_eq!(report.unconfirmed, 0);

    assert_eq!(
        device.written_lines(),
        vec![
            "set_servo_angle 1 120",
            "set_servo_angle 2 45",
            "set_servo_angle 3 90",
            "set_servo_angle 4 90",
        ]
    );
    assert_eq!(device.angles(), rest_angles());
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
fn test_silent_device_completes_unconfirmed() {
    let controller = ArmController::new(fast_config()).unwrap();
    let device = MockDevice::silent();
    device.set_idle_wait(Duration::from_millis(20));
    controller.connect_with(Box::new(device.transport())).unwrap();

    let report = controller.init_servos().unwrap().wait().unwrap();
    assert_eq!(report.sent, 4);
    assert_eq!(report.unconfirmed, 4);
    assert_eq!(device.angles(), rest_angles());
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
fn test_write_failure_aborts_and_reports_servo() {
    let (controller, device) = connected();
    device.set_fail_writes(true);

    let err = controller.init_servos().unwrap().wait().unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Send {
            servo: ServoId::Horizontal,
            ..
        }
    ));
    assert!(device.written_lines().is_empty());
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
fn test_panicking_operation_releases_controller() {
    let (controller, device) = connected();
    device.set_panic_on_write(true);

    let err = controller.init_servos().unwrap().wait().unwrap_err();
    assert!(matches!(
        err,
        ControllerError::OperationPanicked {
            operation: Operation::Initialize,
            ..
        }
    ));
    assert_eq!(controller.state(), ArmState::Idle);
    assert!(!controller.is_busy());

    device.set_panic_on_write(false);
    controller.init_servos().unwrap().wait().unwrap();
    assert_eq!(device.angles(), rest_angles());
}

// ==================== 单次喂食 ====================

#[test]
fn test_single_feed_without_detection_sends_nothing() {
    let (controller, device) = connected();

    let err = controller.start_single_feed().unwrap().wait().unwrap_err();
    assert!(matches!(err, ControllerError::DetectionUnavailable));
    assert!(device.written_lines().is_empty());
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
fn test_single_feed_follows_mouth_offset() {
    let (controller, device) = connected();
    // 嘴部在画面中心右侧 100 像素：水平舵机 round(120 - 100/213 * 30) = 106
    publish(&controller, (420, 240));

    let report = controller.start_single_feed().unwrap().wait().unwrap();
    assert_eq!(report.sent, 3);
    assert_eq!(
        device.commands(),
        vec![
            ServoCommand::new(ServoId::Horizontal, 106),
            ServoCommand::new(ServoId::Vertical, 45),
            ServoCommand::new(ServoId::Feeder, 0),
        ]
    );
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
fn test_single_feed_saturates_at_range_edges() {
    let (controller, device) = connected();
    publish(&controller, (639, 479));

    controller.start_single_feed().unwrap().wait().unwrap();
    assert_eq!(device.angle(ServoId::Horizontal), Some(90));
    assert_eq!(device.angle(ServoId::Vertical), Some(60));
}

#[test]
fn test_extreme_mouth_center_does_not_wedge_controller() {
    let (controller, device) = connected();
    publish(&controller, (i32::MIN, 0));

    controller.start_single_feed().unwrap().wait().unwrap();
    assert_eq!(device.angle(ServoId::Horizontal), Some(150));
    assert_eq!(device.angle(ServoId::Vertical), Some(25));
    assert_eq!(controller.state(), ArmState::Idle);

    publish(&controller, (i32::MAX, i32::MIN));
    controller.start_single_feed().unwrap().wait().unwrap();
    assert_eq!(device.angle(ServoId::Horizontal), Some(90));
    assert_eq!(device.angle(ServoId::Vertical), Some(25));

    controller.init_servos().unwrap().wait().unwrap();
    assert_eq!(device.angles(), rest_angles());
}

// ==================== 手动设置 / 瞄准 ====================

#[test]
fn test_manual_input_validated_before_transmission() {
    let (controller, device) = connected();

    assert!(matches!(
        controller.set_servo(5, 90),
        Err(ControllerError::InvalidInput(_))
    ));
    assert!(matches!(
        controller.set_servo(1, 200),
        Err(ControllerError::InvalidInput(_))
    ));
    assert!(matches!(
        controller.set_servo(0, -1),
        Err(ControllerError::InvalidInput(_))
    ));
    assert!(device.written_lines().is_empty());
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
fn test_manual_set_servo() {
    let (controller, device) = connected();

    let report = controller.set_servo(3, 10).unwrap().wait().unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.unconfirmed, 0);
    assert_eq!(device.written_lines(), vec!["set_servo_angle 3 10"]);
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
fn test_aim_uses_absolute_mapping() {
    let (controller, device) = connected();
    publish(&controller, (420, 240));

    controller.aim_at_detection().unwrap().wait().unwrap();
    // x: (420-100)*180/440 = 130；y: 180 - 140*180/280 = 90
    assert_eq!(
        device.commands(),
        vec![
            ServoCommand::new(ServoId::Horizontal, 130),
            ServoCommand::new(ServoId::Vertical, 90),
        ]
    );
}

// ==================== 动态跟踪 ====================

#[test]
#[serial]
fn test_tracking_hysteresis() {
    let (controller, device) = connected();
    publish(&controller, (420, 240));

    let handle = controller.start_dynamic_tracking().unwrap();
    assert_eq!(controller.state(), ArmState::DynamicTracking);
    assert!(wait_until(|| count_for(&device, ServoId::Horizontal) == 1));

    // 同一位置持续若干周期：不重复发送
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(count_for(&device, ServoId::Horizontal), 1);
    assert_eq!(count_for(&device, ServoId::Vertical), 1);

    // 移动到 520：水平舵机 round(120 - 200/213 * 30) = 92，垂直不变
    publish(&controller, (520, 240));
    assert!(wait_until(|| device.angle(ServoId::Horizontal) == Some(92)));
    assert_eq!(count_for(&device, ServoId::Horizontal), 2);
    assert_eq!(count_for(&device, ServoId::Vertical), 1);

    assert!(controller.stop_tracking());
    let report = handle.wait().unwrap();
    assert_eq!(report.operation, Operation::DynamicTracking);
    assert_eq!(report.sent, 5);

    // 停止跟踪不回中
    assert_eq!(device.angle(ServoId::Horizontal), Some(92));
    assert_eq!(device.angle(ServoId::Wrist), Some(60));
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
#[serial]
fn test_tracking_waits_for_detection() {
    let (controller, device) = connected();

    let handle = controller.start_dynamic_tracking().unwrap();
    std::thread::sleep(Duration::from_millis(60));
    // 只有前置动作：腕部、喂食舵机
    assert_eq!(
        device.commands(),
        vec![
            ServoCommand::new(ServoId::Wrist, 60),
            ServoCommand::new(ServoId::Feeder, 0),
        ]
    );

    controller.stop_tracking();
    handle.wait().unwrap();
}

#[test]
#[serial]
fn test_busy_controller_rejects_transitions() {
    let (controller, device) = connected();
    let tracking = controller.start_dynamic_tracking().unwrap();

    let err = controller.init_servos().unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Busy {
            state: ArmState::DynamicTracking
        }
    ));
    assert!(controller.start_single_feed().is_err());
    assert!(controller.set_servo(1, 90).is_err());
    assert!(controller.is_busy());

    let stop = controller.stop_feeding().unwrap();
    tracking.wait().unwrap();
    stop.wait().unwrap();

    assert_eq!(device.angles(), rest_angles());
    assert_eq!(controller.state(), ArmState::Idle);
    assert!(!controller.is_busy());
}

// ==================== 停止 / 清理 ====================

#[test]
fn test_stop_feeding_from_idle_resets() {
    let (controller, device) = connected();
    controller.set_servo(1, 10).unwrap().wait().unwrap();

    let report = controller.stop_feeding().unwrap().wait().unwrap();
    assert_eq!(report.operation, Operation::StopFeeding);
    assert_eq!(device.angles(), rest_angles());
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
fn test_stop_feeding_after_single_feed() {
    let (controller, device) = connected();
    publish(&controller, (100, 400));

    let feed = controller.start_single_feed().unwrap();
    let stop = controller.stop_feeding().unwrap();
    feed.wait().unwrap();
    stop.wait().unwrap();

    assert_eq!(device.angles(), rest_angles());
    assert_eq!(controller.state(), ArmState::Idle);
}

#[test]
#[serial]
fn test_cleanup_during_tracking_resets_then_disconnects() {
    let (controller, device) = connected();
    publish(&controller, (420, 240));
    let tracking = controller.start_dynamic_tracking().unwrap();
    assert!(wait_until(|| count_for(&device, ServoId::Horizontal) == 1));

    controller.cleanup();
    assert_eq!(device.angles(), rest_angles());
    assert_eq!(controller.state(), ArmState::Disconnected);
    assert!(!controller.is_connected());
    tracking.wait().unwrap();

    // 再次清理无副作用
    let written = device.written_lines().len();
    controller.cleanup();
    assert_eq!(device.written_lines().len(), written);
    assert_eq!(controller.state(), ArmState::Disconnected);
}

#[test]
fn test_cleanup_when_idle_sends_nothing() {
    let (controller, device) = connected();
    controller.cleanup();
    controller.cleanup();
    assert!(device.written_lines().is_empty());
    assert_eq!(controller.state(), ArmState::Disconnected);
}

#[test]
fn test_cleanup_without_connection() {
    let controller = ArmController::new(fast_config()).unwrap();
    controller.cleanup();
    assert_eq!(controller.state(), ArmState::Disconnected);
}

#[test]
fn test_reconnect_after_disconnect() {
    let (controller, _first) = connected();
    controller.disconnect();

    let second = MockDevice::new();
    controller.connect_with(Box::new(second.transport())).unwrap();
    controller.init_servos().unwrap().wait().unwrap();
    assert_eq!(second.angles(), rest_angles());
}

// ==================== 日志 ====================

#[test]
fn test_log_sink_receives_protocol_traffic() {
    let (sink, rx) = ChannelLogSink::new(256);
    let controller = ArmController::builder()
        .config(fast_config())
        .log_sink(Arc::new(sink))
        .build()
        .unwrap();
    let device = MockDevice::new();
    controller.connect_with(Box::new(device.transport())).unwrap();

    controller.set_servo(2, 45).unwrap().wait().unwrap();

    let messages: Vec<_> = rx.try_iter().collect();
    assert!(
        messages
            .iter()
            .any(|r| r.level == LogLevel::Info && r.message == "Sent: set_servo_angle 2 45")
    );
    assert!(
        messages
            .iter()
            .any(|r| r.message.starts_with("Received: Servo 2 set to 45 degrees"))
    );
}
