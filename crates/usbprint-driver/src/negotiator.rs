//! 权限协商
//!
//! 每台设备的状态：`NoPermission → PermissionRequested → {Granted, Denied}`。
//!
//! 协商器只维护"已发出、尚未收到结果"的请求集合，以及权限结果监听的订阅。
//! 监听在集合由空变为非空时订阅，变回空时取消，所以每个请求的监听都是
//! 一次性的。会话的创建、晋升和销毁由注册表负责。
//!
//! 协商器本身不加锁，作为注册表状态的一部分在注册表锁下使用。

use tracing::{debug, warn};

use usbprint_protocol::DeviceIdentity;
use usbprint_usb::{EventSender, Subscription, UsbBackend, UsbDevice, UsbError};

/// 设备权限状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// 没有权限，也没有发出请求
    NoPermission,
    /// 已发出请求，等待平台答复
    PermissionRequested,
    Granted,
    Denied,
}

/// 权限协商器
#[derive(Debug, Default)]
pub struct PermissionNegotiator {
    requested: Vec<DeviceIdentity>,
    listening: bool,
}

impl PermissionNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前状态（不区分已拒绝和从未请求）
    pub fn state(&self, backend: &dyn UsbBackend, device: &UsbDevice) -> PermissionState {
        if self.is_requested(device.identity) {
            PermissionState::PermissionRequested
        } else if backend.has_permission(device) {
            PermissionState::Granted
        } else {
            PermissionState::NoPermission
        }
    }

    pub fn is_requested(&self, identity: DeviceIdentity) -> bool {
        self.requested.contains(&identity)
    }

    /// 尚未答复的请求数
    pub fn outstanding(&self) -> usize {
        self.requested.len()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// 发出权限请求
    ///
    /// 同一设备已有未答复的请求时不重复发出。请求失败时撤销登记，
    /// 调用方应按拒绝处理。
    pub fn request(
        &mut self,
        backend: &dyn UsbBackend,
        device: &UsbDevice,
        events: &EventSender,
    ) -> Result<(), UsbError> {
        let identity = device.identity;
        if self.is_requested(identity) {
            debug!(printer = %identity, "Permission request already outstanding");
            return Ok(());
        }

        if !self.listening {
            backend.subscribe(Subscription::Permission, events.clone())?;
            self.listening = true;
            debug!("Permission listener registered");
        }
        self.requested.push(identity);

        debug!(printer = %identity, "Requesting USB permission");
        if let Err(e) = backend.request_permission(device) {
            warn!(printer = %identity, error = %e, "Permission request failed");
            self.resolve(backend, identity, false);
            return Err(e);
        }
        Ok(())
    }

    /// 处理权限结果
    ///
    /// 返回 `None` 表示该设备没有未答复的请求，结果被忽略。
    pub fn resolve(
        &mut self,
        backend: &dyn UsbBackend,
        identity: DeviceIdentity,
        granted: bool,
    ) -> Option<PermissionState> {
        let position = self.requested.iter().position(|id| *id == identity)?;
        self.requested.swap_remove(position);

        if self.requested.is_empty() {
            self.stop_listening(backend);
        }

        Some(if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        })
    }

    /// 放弃所有未答复的请求并取消监听
    pub fn reset(&mut self, backend: &dyn UsbBackend) {
        self.requested.clear();
        self.stop_listening(backend);
    }

    fn stop_listening(&mut self, backend: &dyn UsbBackend) {
        if self.listening {
            backend.unsubscribe(Subscription::Permission);
            self.listening = false;
            debug!("Permission listener unregistered");
        }
    }
}
