//! libusb 后端
//!
//! 基于 `rusb` 的平台实现，支持 Linux/macOS/Windows。
//!
//! 桌面平台没有权限弹窗：权限等价于"能否打开设备"。`request_permission`
//! 探测一次并立即把结果作为事件投递给已订阅的监听方。
//!
//! 拔出通知优先使用 libusb hotplug；平台不支持时退化为定时比对设备列表。

use parking_lot::Mutex;
use rusb::{DeviceHandle, GlobalContext, UsbContext};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::device::{Direction, EndpointInfo, InterfaceInfo, TransferType, UsbDevice};
use crate::event::{EventSender, PlatformEvent, Subscription};
use crate::{DeviceConnection, UsbBackend, UsbError, UsbErrorKind};
use usbprint_protocol::DeviceIdentity;

impl From<rusb::Error> for UsbError {
    fn from(e: rusb::Error) -> Self {
        let kind = match e {
            rusb::Error::NotFound => UsbErrorKind::NotFound,
            rusb::Error::NoDevice => UsbErrorKind::NoDevice,
            rusb::Error::Access => UsbErrorKind::AccessDenied,
            rusb::Error::Busy => UsbErrorKind::Busy,
            rusb::Error::Timeout => UsbErrorKind::Timeout,
            rusb::Error::Pipe => UsbErrorKind::Pipe,
            rusb::Error::Io => UsbErrorKind::Io,
            rusb::Error::NotSupported => UsbErrorKind::NotSupported,
            _ => UsbErrorKind::Backend,
        };
        UsbError::new(kind, e.to_string())
    }
}

/// libusb 后端配置
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RusbConfig {
    /// 声明接口前卸载内核驱动（Linux/macOS）
    pub detach_kernel_driver: bool,
    /// 不支持 hotplug 时，比对设备列表的间隔（毫秒）
    pub detach_poll_interval_ms: u64,
    /// libusb 事件处理的轮询间隔（毫秒）
    pub event_poll_interval_ms: u64,
}

impl Default for RusbConfig {
    fn default() -> Self {
        Self {
            detach_kernel_driver: true,
            detach_poll_interval_ms: 500,
            event_poll_interval_ms: 200,
        }
    }
}

/// libusb 后端
pub struct RusbBackend {
    config: RusbConfig,
    permission_sink: Mutex<Option<EventSender>>,
    detach_watch: Mutex<Option<DetachWatch>>,
}

impl RusbBackend {
    pub fn new() -> Self {
        Self::with_config(RusbConfig::default())
    }

    pub fn with_config(config: RusbConfig) -> Self {
        Self {
            config,
            permission_sink: Mutex::new(None),
            detach_watch: Mutex::new(None),
        }
    }

    /// 按总线号/地址重新定位设备
    fn find_device(&self, device: &UsbDevice) -> Result<rusb::Device<GlobalContext>, UsbError> {
        for candidate in rusb::devices()?.iter() {
            if candidate.bus_number() != device.bus_number || candidate.address() != device.address {
                continue;
            }
            let desc = candidate.device_descriptor()?;
            if desc.vendor_id() == device.vendor_id() {
                return Ok(candidate);
            }
        }
        Err(UsbError::new(
            UsbErrorKind::NotFound,
            format!("device {} is no longer attached", device.identity),
        ))
    }
}

impl Default for RusbBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// 读取设备描述快照
fn snapshot(device: &rusb::Device<GlobalContext>) -> Result<UsbDevice, UsbError> {
    let desc = device.device_descriptor()?;
    let config = device
        .active_config_descriptor()
        .or_else(|_| device.config_descriptor(0))?;

    let interfaces = config
        .interfaces()
        .filter_map(|iface| {
            iface.descriptors().next().map(|alt| InterfaceInfo {
                number: alt.interface_number(),
                class_code: alt.class_code(),
                endpoints: alt
                    .endpoint_descriptors()
                    .map(|ep| EndpointInfo {
                        address: ep.address(),
                        transfer_type: match ep.transfer_type() {
                            rusb::TransferType::Control => TransferType::Control,
                            rusb::TransferType::Isochronous => TransferType::Isochronous,
                            rusb::TransferType::Bulk => TransferType::Bulk,
                            rusb::TransferType::Interrupt => TransferType::Interrupt,
                        },
                        direction: match ep.direction() {
                            rusb::Direction::In => Direction::In,
                            rusb::Direction::Out => Direction::Out,
                        },
                    })
                    .collect(),
            })
        })
        .collect();

    Ok(UsbDevice {
        identity: identity_of(device)?,
        product_id: desc.product_id(),
        bus_number: device.bus_number(),
        address: device.address(),
        device_class: desc.class_code(),
        interfaces,
    })
}

fn identity_of(device: &rusb::Device<GlobalContext>) -> Result<DeviceIdentity, UsbError> {
    let desc = device.device_descriptor()?;
    Ok(DeviceIdentity::new(
        desc.vendor_id(),
        DeviceIdentity::device_id_from_bus(device.bus_number(), device.address()),
    ))
}

impl UsbBackend for RusbBackend {
    fn devices(&self) -> Result<Vec<UsbDevice>, UsbError> {
        let devices: Vec<UsbDevice> = rusb::devices()?
            .iter()
            .filter_map(|device| match snapshot(&device) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    trace!(
                        bus = device.bus_number(),
                        address = device.address(),
                        error = %e,
                        "Skipping device without readable descriptors"
                    );
                    None
                },
            })
            .collect();
        debug!("Found: {} Devices", devices.len());
        Ok(devices)
    }

    fn open(&self, device: &UsbDevice) -> Result<Box<dyn DeviceConnection>, UsbError> {
        let handle = self.find_device(device)?.open()?;
        Ok(Box::new(RusbConnection {
            handle,
            claimed: None,
            detach_kernel_driver: self.config.detach_kernel_driver,
        }))
    }

    fn has_permission(&self, device: &UsbDevice) -> bool {
        match self.find_device(device).and_then(|d| d.open().map_err(UsbError::from)) {
            Ok(_handle) => true,
            Err(e) => {
                debug!(printer = %device.identity, error = %e, "No access to device");
                false
            },
        }
    }

    fn request_permission(&self, device: &UsbDevice) -> Result<(), UsbError> {
        let Some(sink) = self.permission_sink.lock().clone() else {
            warn!(printer = %device.identity, "Permission requested without a listener, result dropped");
            return Ok(());
        };

        let granted = self.has_permission(device);
        let _ = sink.send(PlatformEvent::PermissionResult {
            identity: device.identity,
            granted,
        });
        Ok(())
    }

    fn subscribe(&self, subscription: Subscription, sink: EventSender) -> Result<(), UsbError> {
        match subscription {
            Subscription::Permission => {
                *self.permission_sink.lock() = Some(sink);
            },
            Subscription::Detach => {
                let mut watch = self.detach_watch.lock();
                if watch.is_none() {
                    *watch = Some(DetachWatch::start(&self.config, sink)?);
                }
            },
        }
        Ok(())
    }

    fn unsubscribe(&self, subscription: Subscription) {
        match subscription {
            Subscription::Permission => {
                self.permission_sink.lock().take();
            },
            Subscription::Detach => {
                // Drop 会等待监听线程退出
                let watch = self.detach_watch.lock().take();
                drop(watch);
            },
        }
    }
}

/// libusb 设备连接
///
/// Drop 时释放接口并关闭句柄。
struct RusbConnection {
    handle: DeviceHandle<GlobalContext>,
    claimed: Option<u8>,
    detach_kernel_driver: bool,
}

impl DeviceConnection for RusbConnection {
    fn claim_interface(&mut self, interface: u8, force: bool) -> Result<(), UsbError> {
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            if force
                && self.detach_kernel_driver
                && self.handle.kernel_driver_active(interface).unwrap_or(false)
            {
                self.handle.detach_kernel_driver(interface)?;
            }
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let _ = (force, self.detach_kernel_driver);

        self.handle.claim_interface(interface)?;
        self.claimed = Some(interface);
        Ok(())
    }

    fn bulk_write(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        Ok(self.handle.write_bulk(endpoint, data, timeout)?)
    }

    fn control_read(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        Ok(self
            .handle
            .read_control(request_type, request, value, index, buf, timeout)?)
    }
}

impl Drop for RusbConnection {
    fn drop(&mut self) {
        if let Some(interface) = self.claimed.take() {
            // 设备可能已拔出，忽略错误
            let _ = self.handle.release_interface(interface);
            trace!("[Release] USB interface {} released", interface);
        }
    }
}

// ============================================================================
// 拔出监听
// ============================================================================

/// hotplug 回调：只关心拔出
struct DetachNotifier {
    sink: EventSender,
}

impl rusb::Hotplug<GlobalContext> for DetachNotifier {
    fn device_arrived(&mut self, _device: rusb::Device<GlobalContext>) {}

    fn device_left(&mut self, device: rusb::Device<GlobalContext>) {
        match identity_of(&device) {
            Ok(identity) => {
                debug!(printer = %identity, "USB device detached");
                let _ = self.sink.send(PlatformEvent::Detached { identity });
            },
            Err(e) => warn!(error = %e, "Detached device without readable descriptor"),
        }
    }
}

/// 拔出监听（hotplug 或轮询）
struct DetachWatch {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    registration: Option<rusb::Registration<GlobalContext>>,
}

impl DetachWatch {
    fn start(config: &RusbConfig, sink: EventSender) -> Result<Self, UsbError> {
        let stop = Arc::new(AtomicBool::new(false));

        if rusb::has_hotplug() {
            let mut builder = rusb::HotplugBuilder::new();
            builder.enumerate(false);
            let registration: rusb::Registration<GlobalContext> =
                builder.register(GlobalContext::default(), Box::new(DetachNotifier { sink }))?;

            let interval = Duration::from_millis(config.event_poll_interval_ms);
            let thread = spawn_named("usbprint-hotplug", {
                let stop = stop.clone();
                move || {
                    let context = GlobalContext::default();
                    while !stop.load(Ordering::Acquire) {
                        if let Err(e) = context.handle_events(Some(interval)) {
                            warn!(error = %e, "libusb event handling failed");
                            std::thread::sleep(interval);
                        }
                    }
                }
            })?;

            debug!("Detach watch started (hotplug)");
            Ok(Self {
                stop,
                thread: Some(thread),
                registration: Some(registration),
            })
        } else {
            let interval = Duration::from_millis(config.detach_poll_interval_ms);
            let thread = spawn_named("usbprint-detach-poll", {
                let stop = stop.clone();
                move || poll_detach(stop, sink, interval)
            })?;

            debug!("Detach watch started (polling every {:?})", interval);
            Ok(Self {
                stop,
                thread: Some(thread),
                registration: None,
            })
        }
    }
}

impl Drop for DetachWatch {
    fn drop(&mut self) {
        // 先注销回调，再停线程
        self.registration.take();
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        debug!("Detach watch stopped");
    }
}

fn spawn_named<F>(name: &str, f: F) -> Result<JoinHandle<()>, UsbError>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| UsbError::new(UsbErrorKind::Backend, format!("failed to spawn {}: {}", name, e)))
}

fn attached_identities() -> HashSet<DeviceIdentity> {
    match rusb::devices() {
        Ok(list) => list.iter().filter_map(|d| identity_of(&d).ok()).collect(),
        Err(e) => {
            warn!(error = %e, "Failed to enumerate devices");
            HashSet::new()
        },
    }
}

/// 轮询比对设备列表，消失的设备按拔出处理
fn poll_detach(stop: Arc<AtomicBool>, sink: EventSender, interval: Duration) {
    let mut previous = attached_identities();
    while !stop.load(Ordering::Acquire) {
        std::thread::sleep(interval);
        let current = attached_identities();
        for identity in previous.difference(&current) {
            debug!(printer = %identity, "USB device detached");
            if sink.send(PlatformEvent::Detached { identity: *identity }).is_err() {
                return;
            }
        }
        previous = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rusb_error_mapping() {
        assert_eq!(UsbError::from(rusb::Error::Access).kind, UsbErrorKind::AccessDenied);
        assert_eq!(UsbError::from(rusb::Error::NoDevice).kind, UsbErrorKind::NoDevice);
        assert_eq!(UsbError::from(rusb::Error::Timeout).kind, UsbErrorKind::Timeout);
        assert_eq!(UsbError::from(rusb::Error::Overflow).kind, UsbErrorKind::Backend);
        assert!(UsbError::from(rusb::Error::NoDevice).is_fatal());
    }

    #[test]
    fn test_default_config() {
        let config = RusbConfig::default();
        assert!(config.detach_kernel_driver);
        assert_eq!(config.detach_poll_interval_ms, 500);
        assert_eq!(config.event_poll_interval_ms, 200);
    }

    // 注意：枚举和实际 USB 传输需要硬件，不在单元测试中覆盖
}
