//! 事件线程
//!
//! 在后台线程上消费注册表的平台事件通道，把每个事件交给
//! [`SessionRegistry::handle_event`]。Drop 时停止并等待线程退出。

use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, trace};

use crate::registry::SessionRegistry;

/// 检查停止标志的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 平台事件线程
pub struct EventPump {
    is_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EventPump {
    /// 启动事件线程
    pub fn start(registry: Arc<SessionRegistry>) -> std::io::Result<Self> {
        let is_running = Arc::new(AtomicBool::new(true));
        let events = registry.events();

        let thread = std::thread::Builder::new().name("usbprint-events".to_string()).spawn({
            let is_running = is_running.clone();
            move || {
                debug!("Event pump started");
                while is_running.load(Ordering::Acquire) {
                    match events.recv_timeout(POLL_INTERVAL) {
                        Ok(event) => {
                            trace!(?event, "Platform event");
                            registry.handle_event(event);
                        },
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Event pump stopped");
            }
        })?;

        Ok(Self {
            is_running,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 停止事件线程并等待退出
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Event pump thread panicked");
        }
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::SessionNotice;
    use usbprint_protocol::DeviceIdentity;
    use usbprint_usb::mock::MockBackend;

    #[test]
    fn test_pump_applies_permission_result() {
        let backend = Arc::new(MockBackend::new());
        let identity = DeviceIdentity::new(1155, 1002);
        backend.add_device(MockBackend::printer(identity));
        let registry = Arc::new(SessionRegistry::new(backend.clone()));
        let mut pump = EventPump::start(registry.clone()).unwrap();

        let notices = registry.connect("1155_1002").unwrap();
        backend.deliver_permission(identity, true);

        assert_eq!(
            notices.recv_timeout(Duration::from_secs(2)),
            Ok(SessionNotice::Connected)
        );
        assert!(registry.is_connected("1155_1002"));

        pump.stop();
        assert!(!pump.is_running());
    }
}
