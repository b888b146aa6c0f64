//! 会话注册表
//!
//! 打印机名称到 [`PrinterSession`] 的映射，是"当前连接了哪些打印机"的唯一来源。
//!
//! # 锁
//!
//! 注册表锁覆盖会话表、权限协商器和拔出订阅标志。连接、断开、拔出、
//! 权限结果、关闭都完整地在这把锁下执行，包括对受影响会话的
//! `mark_connected` / `close`。
//!
//! 加锁顺序固定为"注册表 → 会话"。按设备的 I/O 操作只在注册表锁下查找
//! 会话并克隆 `Arc`，释放注册表锁后再进入会话，阻塞的 USB 传输不会卡住注册表。
//!
//! # 平台事件
//!
//! 权限结果和拔出通知以 [`PlatformEvent`] 的形式送到注册表自己的事件通道，
//! 由 [`handle_event`](SessionRegistry::handle_event) 在注册表锁下处理。
//! 可以用 [`EventPump`](crate::EventPump) 在后台线程消费，
//! 也可以调用 [`drain_events`](SessionRegistry::drain_events) 手动处理。

use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use usbprint_protocol::{DeviceIdentity, UsbClass};
use usbprint_usb::{
    EventReceiver, EventSender, PlatformEvent, Subscription, UsbBackend, UsbDevice,
};

use crate::config::DriverConfig;
use crate::negotiator::{PermissionNegotiator, PermissionState};
use crate::notice::{
    DisconnectReason, LogNotifier, NoticeReceiver, UserNotice, UserNotifier,
};
use crate::session::PrinterSession;
use crate::DriverError;

/// 候选打印机（设备列表中的打印机类设备）
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PrinterInfo {
    pub printer_name: String,
    pub vendor_id: u16,
    pub device_id: u32,
    pub product_id: u16,
    pub class_code: u8,
}

impl PrinterInfo {
    pub fn class(&self) -> UsbClass {
        UsbClass::from(self.class_code)
    }
}

impl From<&UsbDevice> for PrinterInfo {
    fn from(device: &UsbDevice) -> Self {
        Self {
            printer_name: device.printer_name(),
            vendor_id: device.vendor_id(),
            device_id: device.device_id(),
            product_id: device.product_id,
            class_code: device.class_code(),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<DeviceIdentity, Arc<PrinterSession>>,
    negotiator: PermissionNegotiator,
    watching_detach: bool,
}

/// 会话注册表
pub struct SessionRegistry {
    backend: Arc<dyn UsbBackend>,
    config: DriverConfig,
    notifier: Arc<dyn UserNotifier>,
    events_tx: EventSender,
    events_rx: EventReceiver,
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    /// 使用默认配置和日志提示创建注册表
    pub fn new(backend: Arc<dyn UsbBackend>) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            backend,
            config: DriverConfig::default(),
            notifier: Arc::new(LogNotifier),
            events_tx,
            events_rx,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn UserNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// 平台事件接收端
    pub fn events(&self) -> EventReceiver {
        self.events_rx.clone()
    }

    // ========================================================================
    // 发现
    // ========================================================================

    /// 列出当前插入的打印机类设备（与连接状态无关）
    pub fn list_candidates(&self) -> Result<Vec<PrinterInfo>, DriverError> {
        let devices = self.backend.devices()?;
        let printers: Vec<PrinterInfo> = devices
            .iter()
            .filter(|device| device.is_printer())
            .map(PrinterInfo::from)
            .collect();
        debug!("Found: {} Devices, {} printers", devices.len(), printers.len());
        Ok(printers)
    }

    fn find_device(&self, name: &str) -> Result<UsbDevice, DriverError> {
        let identity = parse_name(name)?;
        self.backend
            .devices()?
            .into_iter()
            .find(|device| device.identity == identity)
            .ok_or_else(|| DriverError::NotFound(name.to_string()))
    }

    // ========================================================================
    // 连接生命周期
    // ========================================================================

    /// 连接打印机
    ///
    /// 返回的接收端会收到 `Connected`，以及之后的 `Disconnected(reason)`。
    /// 没有权限时先向平台请求授权，结果异步送达；同一设备已有会话
    /// （包括等待授权的会话）时不会重复创建或重复请求。
    pub fn connect(&self, name: &str) -> Result<NoticeReceiver, DriverError> {
        let device = self.find_device(name)?;
        let identity = device.identity;
        let (sink, notices) = unbounded();

        let mut state = self.state.lock();
        if let Some(session) = state.sessions.get(&identity) {
            debug!(printer = %identity, "Session already registered, attaching caller");
            session.attach_sink(sink);
            return Ok(notices);
        }

        let session = Arc::new(PrinterSession::new(self.backend.clone(), device.clone()));
        session.attach_sink(sink);

        match state.negotiator.state(self.backend.as_ref(), &device) {
            PermissionState::Granted => {
                debug!(printer = %identity, "Already got permission, connecting directly");
                session.mark_connected();
                state.sessions.insert(identity, session);
                self.sync_detach_watch(&mut state);
            },
            _ => {
                state.sessions.insert(identity, session.clone());
                self.sync_detach_watch(&mut state);

                if state
                    .negotiator
                    .request(self.backend.as_ref(), &device, &self.events_tx)
                    .is_err()
                {
                    session.close(DisconnectReason::PermissionDenied);
                    state.sessions.remove(&identity);
                    self.sync_detach_watch(&mut state);
                }
            },
        }

        Ok(notices)
    }

    /// 断开打印机
    pub fn disconnect(&self, name: &str) -> Result<(), DriverError> {
        let identity = parse_name(name)?;
        let mut state = self.state.lock();
        let session = state
            .sessions
            .remove(&identity)
            .ok_or_else(|| DriverError::NotFound(name.to_string()))?;

        session.close(DisconnectReason::Requested);
        self.sync_detach_watch(&mut state);
        info!(printer = %identity, "Printer disconnected");
        Ok(())
    }

    /// 处理拔出通知
    ///
    /// 不在注册表中的设备（非打印机或未连接）被忽略。
    pub fn on_detach(&self, identity: DeviceIdentity) {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.sessions.remove(&identity);
            if let Some(session) = &removed {
                session.close(DisconnectReason::Detached);
                self.sync_detach_watch(&mut state);
            }
            removed
        };

        match removed {
            Some(session) => {
                info!(printer = %identity, "Printer detached");
                self.notifier
                    .notify(&UserNotice::PrinterDetached { name: session.name() });
            },
            None => debug!(printer = %identity, "Detach of unregistered device ignored"),
        }
    }

    /// 处理权限结果
    ///
    /// 没有对应请求的结果被忽略；请求发出后会话已被断开时，
    /// 结果只结束请求，不改动会话表。
    pub fn on_permission_result(&self, identity: DeviceIdentity, granted: bool) {
        let mut state = self.state.lock();
        let Some(outcome) = state
            .negotiator
            .resolve(self.backend.as_ref(), identity, granted)
        else {
            debug!(printer = %identity, "Permission result without outstanding request ignored");
            return;
        };

        match outcome {
            PermissionState::Granted => match state.sessions.get(&identity).cloned() {
                Some(session) => {
                    info!(printer = %identity, "Permission granted");
                    session.mark_connected();
                    self.sync_detach_watch(&mut state);
                },
                None => debug!(printer = %identity, "Permission granted for removed session"),
            },
            _ => {
                warn!(printer = %identity, "Permission denied");
                if let Some(session) = state.sessions.remove(&identity) {
                    session.close(DisconnectReason::PermissionDenied);
                    self.sync_detach_watch(&mut state);
                }
            },
        }
    }

    /// 平台事件入口
    pub fn handle_event(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::PermissionResult { identity, granted } => {
                self.on_permission_result(identity, granted)
            },
            PlatformEvent::Detached { identity } => self.on_detach(identity),
        }
    }

    /// 处理事件通道中已有的全部事件，返回处理数量
    pub fn drain_events(&self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// 关闭全部会话，取消权限和拔出监听
    pub fn teardown(&self) {
        let mut state = self.state.lock();
        for (_, session) in state.sessions.drain() {
            session.close(DisconnectReason::Shutdown);
        }
        state.negotiator.reset(self.backend.as_ref());
        self.sync_detach_watch(&mut state);
        debug!("Session registry torn down");
    }

    /// 会话表大小 0 ↔ 非 0 变化时订阅/取消拔出通知
    fn sync_detach_watch(&self, state: &mut RegistryState) {
        let wanted = !state.sessions.is_empty();
        if wanted && !state.watching_detach {
            match self
                .backend
                .subscribe(Subscription::Detach, self.events_tx.clone())
            {
                Ok(()) => {
                    state.watching_detach = true;
                    debug!("Watching for printer detach");
                },
                Err(e) => warn!(error = %e, "Failed to subscribe to detach notifications"),
            }
        } else if !wanted && state.watching_detach {
            self.backend.unsubscribe(Subscription::Detach);
            state.watching_detach = false;
            debug!("Stopped watching for printer detach");
        }
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 查找会话（包括等待授权的会话）
    pub fn lookup(&self, name: &str) -> Option<Arc<PrinterSession>> {
        let identity = name.parse::<DeviceIdentity>().ok()?;
        self.state.lock().sessions.get(&identity).cloned()
    }

    fn session(&self, name: &str) -> Result<Arc<PrinterSession>, DriverError> {
        self.lookup(name)
            .ok_or_else(|| DriverError::NotFound(name.to_string()))
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|session| session.is_connected())
    }

    /// 已连接的打印机名称（按名称排序）
    pub fn connected_printers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .sessions
            .values()
            .filter(|session| session.is_connected())
            .map(|session| session.name())
            .collect();
        names.sort();
        names
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn is_watching_detach(&self) -> bool {
        self.state.lock().watching_detach
    }

    // ========================================================================
    // 按设备的操作
    // ========================================================================

    /// 打印文本（使用配置的字符集）
    pub fn print(&self, name: &str, message: &str) -> Result<(), DriverError> {
        let session = self.session(name)?;
        let result = session.print(message, &self.config.charset);
        if let Err(DriverError::PaperOut(_)) = &result
            && self.config.notify_paper_out
        {
            self.notifier
                .notify(&UserNotice::PaperOut { name: session.name() });
        }
        result
    }

    /// 发送原始命令字节
    pub fn send_command(&self, name: &str, bytes: &[u8]) -> Result<(), DriverError> {
        self.session(name)?.send_raw(bytes);
        Ok(())
    }

    pub fn is_paper_available(&self, name: &str) -> Result<bool, DriverError> {
        Ok(self.session(name)?.is_paper_available())
    }

    /// 切纸（不进纸）
    pub fn cut_paper(&self, name: &str) -> Result<(), DriverError> {
        self.session(name)?.cut_paper(0);
        Ok(())
    }

    /// 按模式切纸，模式无效时不发送
    pub fn cut_by_mode(&self, name: &str, mode: i32) -> Result<(), DriverError> {
        self.session(name)?.cut_by_mode(mode);
        Ok(())
    }

    pub fn open_cash_box(&self, name: &str) -> Result<(), DriverError> {
        self.session(name)?.open_cash_box();
        Ok(())
    }

    pub fn default_buzzer(&self, name: &str) -> Result<(), DriverError> {
        self.session(name)?.default_buzzer();
        Ok(())
    }

    pub fn buzzer(&self, name: &str, count: i32, duration: i32) -> Result<(), DriverError> {
        self.session(name)?.buzzer(count, duration);
        Ok(())
    }

    pub fn set_buzzer_mode(
        &self,
        name: &str,
        count: i32,
        duration: i32,
        mode: i32,
    ) -> Result<(), DriverError> {
        self.session(name)?.set_buzzer_mode(count, duration, mode);
        Ok(())
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn parse_name(name: &str) -> Result<DeviceIdentity, DriverError> {
    name.parse::<DeviceIdentity>()
        .map_err(|_| DriverError::NotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::SessionNotice;
    use usbprint_usb::mock::MockBackend;

    const NAME: &str = "1155_1002";

    fn setup() -> (Arc<MockBackend>, SessionRegistry) {
        let backend = Arc::new(MockBackend::new());
        backend.add_device(MockBackend::printer(DeviceIdentity::new(1155, 1002)));
        let registry = SessionRegistry::new(backend.clone());
        (backend, registry)
    }

    #[test]
    fn test_connect_with_permission_is_immediate() {
        let (backend, registry) = setup();
        backend.grant(DeviceIdentity::new(1155, 1002));

        let notices = registry.connect(NAME).unwrap();
        assert_eq!(notices.try_recv(), Ok(SessionNotice::Connected));
        assert!(registry.is_connected(NAME));
        assert!(backend.permission_requests().is_empty());
    }

    #[test]
    fn test_connect_unknown_or_invalid_name() {
        let (_backend, registry) = setup();

        assert!(registry.connect("1155_9999").unwrap_err().is_not_found());
        assert!(registry.connect("printer").unwrap_err().is_not_found());
        assert!(registry.connect("1_2_3").unwrap_err().is_not_found());
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_pending_session_promoted_on_grant() {
        let (backend, registry) = setup();

        let notices = registry.connect(NAME).unwrap();
        assert!(notices.try_recv().is_err());
        assert!(!registry.is_connected(NAME));
        assert_eq!(registry.session_count(), 1);

        backend.deliver_permission(DeviceIdentity::new(1155, 1002), true);
        assert_eq!(registry.drain_events(), 1);
        assert_eq!(notices.try_recv(), Ok(SessionNotice::Connected));
        assert_eq!(registry.connected_printers(), vec![NAME.to_string()]);
    }

    #[test]
    fn test_lookup_of_invalid_name_is_absent() {
        let (_backend, registry) = setup();
        assert!(registry.lookup("not-a-printer").is_none());
        assert!(registry.cut_paper("not-a-printer").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_candidates_filters_printers() {
        let (backend, registry) = setup();
        let mut hub = MockBackend::printer(DeviceIdentity::new(7531, 1001));
        hub.interfaces[0].class_code = 0x09;
        backend.add_device(hub);

        let candidates = registry.list_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].printer_name, NAME);
        assert_eq!(candidates[0].vendor_id, 1155);
        assert_eq!(candidates[0].device_id, 1002);
        assert_eq!(candidates[0].class(), UsbClass::Printer);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_printer_info_json_keys() {
        let info = PrinterInfo {
            printer_name: NAME.to_string(),
            vendor_id: 1155,
            device_id: 1002,
            product_id: 1,
            class_code: 7,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["printerName"], NAME);
        assert_eq!(json["vendorId"], 1155);
        assert_eq!(json["deviceId"], 1002);
        assert!(json.get("printer_name").is_none());
    }
}
