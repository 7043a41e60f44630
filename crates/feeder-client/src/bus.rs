//! 舵机总线
//!
//! 序列执行器通过 [`ServoBus`] 发送指令，不直接持有串口链路。
//! [`LinkSlot`] 是控制器独占的链路槽：连接时放入、断开时取出并关闭，
//! 每条指令事务期间持锁，保证同一时刻只有一个线程占用串口。

use feeder_driver::{SendError, ServoAck, ServoLink};
use feeder_protocol::ServoCommand;
use parking_lot::Mutex;
use std::time::Duration;

/// 发送单条舵机指令的能力
pub trait ServoBus: Send + Sync {
    /// 发送指令并在 `timeout` 内等待应答
    fn send(&self, command: ServoCommand, timeout: Duration) -> Result<ServoAck, SendError>;
}

/// 控制器独占的串口链路槽
#[derive(Debug, Default)]
pub struct LinkSlot {
    link: Mutex<Option<ServoLink>>,
}

impl LinkSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入新链路；已有链路时拒绝并原样返回
    pub fn install(&self, link: ServoLink) -> Result<(), ServoLink> {
        let mut slot = self.link.lock();
        if slot.is_some() {
            return Err(link);
        }
        *slot = Some(link);
        Ok(())
    }

    /// 取出并关闭链路（幂等），返回是否确有链路被关闭
    pub fn close(&self) -> bool {
        match self.link.lock().take() {
            Some(mut link) => {
                link.close();
                true
            },
            None => false,
        }
    }

    /// 是否已放入链路
    pub fn is_connected(&self) -> bool {
        self.link.lock().as_ref().is_some_and(ServoLink::is_open)
    }

    /// 当前端口名
    pub fn port_name(&self) -> Option<String> {
        self.link.lock().as_ref().map(|l| l.port_name().to_string())
    }
}

impl ServoBus for LinkSlot {
    fn send(&self, command: ServoCommand, timeout: Duration) -> Result<ServoAck, SendError> {
        let mut slot = self.link.lock();
        let link = slot.as_mut().ok_or(SendError::Closed)?;
        link.send_command(command, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeder_driver::NullLogSink;
    use feeder_protocol::ServoId;
    use feeder_serial::MockDevice;

    fn mock_link(device: &MockDevice) -> ServoLink {
        ServoLink::with_transport(Box::new(device.transport()), NullLogSink::shared()).unwrap()
    }

    #[test]
    fn test_empty_slot_reports_closed() {
        let slot = LinkSlot::new();
        assert!(!slot.is_connected());
        assert!(matches!(
            slot.send(
                ServoCommand::new(ServoId::Wrist, 90),
                Duration::from_millis(10)
            ),
            Err(SendError::Closed)
        ));
    }

    #[test]
    fn test_install_send_close() {
        let device = MockDevice::new();
        let slot = LinkSlot::new();
        slot.install(mock_link(&device)).unwrap();
        assert!(slot.is_connected());
        assert_eq!(slot.port_name().as_deref(), Some("mock"));

        // 第二条链路被拒绝
        assert!(slot.install(mock_link(&device)).is_err());

        let ack = slot
            .send(
                ServoCommand::new(ServoId::Feeder, 0),
                Duration::from_millis(100),
            )
            .unwrap();
        assert!(ack.confirmed);

        assert!(slot.close());
        assert!(!slot.close());
        assert!(!slot.is_connected());
    }
}
