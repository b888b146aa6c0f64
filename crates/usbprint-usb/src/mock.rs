//! Mock 后端
//!
//! 用于测试的模拟 USB 平台：设备列表、权限、订阅、传输记录都保存在内存中，
//! 权限结果和拔出通知由测试显式投递。

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::device::{EndpointInfo, InterfaceInfo, TransferType, UsbDevice};
use crate::event::{EventSender, PlatformEvent, Subscription};
use crate::{DeviceConnection, UsbBackend, UsbError, UsbErrorKind};
use usbprint_protocol::{DeviceIdentity, USB_CLASS_PRINTER};

/// 模拟的状态查询响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStatus {
    Response(Vec<u8>),
    Fail,
}

impl Default for MockStatus {
    fn default() -> Self {
        MockStatus::Response(vec![0x12, 0x00])
    }
}

#[derive(Default)]
struct MockState {
    devices: Vec<UsbDevice>,
    permitted: HashSet<DeviceIdentity>,
    permission_requests: Vec<DeviceIdentity>,
    /// 收到权限请求时立即答复（None 表示等待测试投递）
    auto_answer: Option<bool>,
    sinks: HashMap<Subscription, EventSender>,
    subscribe_calls: HashMap<Subscription, usize>,
    unsubscribe_calls: HashMap<Subscription, usize>,
    writes: HashMap<DeviceIdentity, Vec<Vec<u8>>>,
    status: HashMap<DeviceIdentity, MockStatus>,
    control_reads: HashMap<DeviceIdentity, usize>,
    opens: HashMap<DeviceIdentity, usize>,
    claims: HashMap<DeviceIdentity, usize>,
    /// 每次传输收到的超时，按调用顺序
    timeouts: Vec<(TransferType, Duration)>,
    fail_open: HashSet<DeviceIdentity>,
    fail_claim: HashSet<DeviceIdentity>,
}

/// 模拟 USB 平台
#[derive(Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 构建一个打印机设备：接口 0 上依次是 Bulk IN 0x81、Bulk OUT 0x02、Bulk OUT 0x03
    pub fn printer(identity: DeviceIdentity) -> UsbDevice {
        UsbDevice {
            identity,
            product_id: 0x5011,
            bus_number: (identity.device_id / 1000) as u8,
            address: (identity.device_id % 1000) as u8,
            device_class: 0,
            interfaces: vec![InterfaceInfo {
                number: 0,
                class_code: USB_CLASS_PRINTER,
                endpoints: vec![
                    EndpointInfo::new(0x81, TransferType::Bulk),
                    EndpointInfo::new(0x02, TransferType::Bulk),
                    EndpointInfo::new(0x03, TransferType::Bulk),
                ],
            }],
        }
    }

    pub fn add_device(&self, device: UsbDevice) {
        self.state.lock().devices.push(device);
    }

    pub fn remove_device(&self, identity: DeviceIdentity) {
        self.state.lock().devices.retain(|d| d.identity != identity);
    }

    /// 预先授予权限
    pub fn grant(&self, identity: DeviceIdentity) {
        self.state.lock().permitted.insert(identity);
    }

    pub fn set_auto_answer(&self, answer: Option<bool>) {
        self.state.lock().auto_answer = answer;
    }

    pub fn permission_requests(&self) -> Vec<DeviceIdentity> {
        self.state.lock().permission_requests.clone()
    }

    /// 投递权限结果（未订阅时丢弃并返回 false）
    pub fn deliver_permission(&self, identity: DeviceIdentity, granted: bool) -> bool {
        let mut state = self.state.lock();
        if granted {
            state.permitted.insert(identity);
        }
        match state.sinks.get(&Subscription::Permission) {
            Some(sink) => sink
                .send(PlatformEvent::PermissionResult { identity, granted })
                .is_ok(),
            None => false,
        }
    }

    /// 拔出设备并投递通知（未订阅时只移除设备）
    pub fn deliver_detach(&self, identity: DeviceIdentity) -> bool {
        let mut state = self.state.lock();
        state.devices.retain(|d| d.identity != identity);
        match state.sinks.get(&Subscription::Detach) {
            Some(sink) => sink.send(PlatformEvent::Detached { identity }).is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self, subscription: Subscription) -> bool {
        self.state.lock().sinks.contains_key(&subscription)
    }

    pub fn subscribe_count(&self, subscription: Subscription) -> usize {
        self.state.lock().subscribe_calls.get(&subscription).copied().unwrap_or(0)
    }

    pub fn unsubscribe_count(&self, subscription: Subscription) -> usize {
        self.state.lock().unsubscribe_calls.get(&subscription).copied().unwrap_or(0)
    }

    pub fn writes(&self, identity: DeviceIdentity) -> Vec<Vec<u8>> {
        self.state.lock().writes.get(&identity).cloned().unwrap_or_default()
    }

    pub fn set_status(&self, identity: DeviceIdentity, status: MockStatus) {
        self.state.lock().status.insert(identity, status);
    }

    /// 所有 Bulk / 控制传输收到的超时
    pub fn transfer_timeouts(&self) -> Vec<(TransferType, Duration)> {
        self.state.lock().timeouts.clone()
    }

    pub fn control_read_count(&self, identity: DeviceIdentity) -> usize {
        self.state.lock().control_reads.get(&identity).copied().unwrap_or(0)
    }

    pub fn open_count(&self, identity: DeviceIdentity) -> usize {
        self.state.lock().opens.get(&identity).copied().unwrap_or(0)
    }

    pub fn claim_count(&self, identity: DeviceIdentity) -> usize {
        self.state.lock().claims.get(&identity).copied().unwrap_or(0)
    }

    pub fn fail_open(&self, identity: DeviceIdentity, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.fail_open.insert(identity);
        } else {
            state.fail_open.remove(&identity);
        }
    }

    pub fn fail_claim(&self, identity: DeviceIdentity, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.fail_claim.insert(identity);
        } else {
            state.fail_claim.remove(&identity);
        }
    }
}

impl UsbBackend for MockBackend {
    fn devices(&self) -> Result<Vec<UsbDevice>, UsbError> {
        Ok(self.state.lock().devices.clone())
    }

    fn open(&self, device: &UsbDevice) -> Result<Box<dyn DeviceConnection>, UsbError> {
        let mut state = self.state.lock();
        let identity = device.identity;
        if state.fail_open.contains(&identity) {
            return Err(UsbError::new(UsbErrorKind::AccessDenied, "mock open failure"));
        }
        if !state.devices.iter().any(|d| d.identity == identity) {
            return Err(UsbError::new(UsbErrorKind::NoDevice, "mock device not attached"));
        }
        *state.opens.entry(identity).or_default() += 1;
        Ok(Box::new(MockConnection {
            identity,
            state: self.state.clone(),
        }))
    }

    fn has_permission(&self, device: &UsbDevice) -> bool {
        self.state.lock().permitted.contains(&device.identity)
    }

    fn request_permission(&self, device: &UsbDevice) -> Result<(), UsbError> {
        let auto_answer = {
            let mut state = self.state.lock();
            state.permission_requests.push(device.identity);
            state.auto_answer
        };
        if let Some(granted) = auto_answer {
            self.deliver_permission(device.identity, granted);
        }
        Ok(())
    }

    fn subscribe(&self, subscription: Subscription, sink: EventSender) -> Result<(), UsbError> {
        let mut state = self.state.lock();
        *state.subscribe_calls.entry(subscription).or_default() += 1;
        state.sinks.insert(subscription, sink);
        Ok(())
    }

    fn unsubscribe(&self, subscription: Subscription) {
        let mut state = self.state.lock();
        *state.unsubscribe_calls.entry(subscription).or_default() += 1;
        state.sinks.remove(&subscription);
    }
}

struct MockConnection {
    identity: DeviceIdentity,
    state: Arc<Mutex<MockState>>,
}

impl DeviceConnection for MockConnection {
    fn claim_interface(&mut self, _interface: u8, _force: bool) -> Result<(), UsbError> {
        let mut state = self.state.lock();
        *state.claims.entry(self.identity).or_default() += 1;
        if state.fail_claim.contains(&self.identity) {
            return Err(UsbError::new(UsbErrorKind::Busy, "mock claim failure"));
        }
        Ok(())
    }

    fn bulk_write(
        &mut self,
        _endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        let mut state = self.state.lock();
        state.timeouts.push((TransferType::Bulk, timeout));
        if !state.devices.iter().any(|d| d.identity == self.identity) {
            return Err(UsbError::new(UsbErrorKind::NoDevice, "mock device detached"));
        }
        state.writes.entry(self.identity).or_default().push(data.to_vec());
        Ok(data.len())
    }

    fn control_read(
        &mut self,
        _request_type: u8,
        _request: u8,
        _value: u16,
        _index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        let mut state = self.state.lock();
        state.timeouts.push((TransferType::Control, timeout));
        *state.control_reads.entry(self.identity).or_default() += 1;
        match state.status.get(&self.identity).cloned().unwrap_or_default() {
            MockStatus::Response(bytes) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            },
            MockStatus::Fail => Err(UsbError::new(UsbErrorKind::Pipe, "mock control failure")),
        }
    }
}
