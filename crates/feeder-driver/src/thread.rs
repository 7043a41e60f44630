//! 线程工具

use crossbeam_channel::{RecvTimeoutError, bounded};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;

/// 带超时的线程 join
pub trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = bounded(1);

        // 看门狗线程代为 join，超时后自行结束
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::other(
                "Join watchdog disconnected",
            ))),
        }
    }
}
