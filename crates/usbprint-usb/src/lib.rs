//! # USBPrint USB Layer
//!
//! USB 硬件抽象层：平台接口（设备枚举、打开、权限、通知订阅）、
//! 平台事件，以及把原始设备句柄变成可写通道的 `Channel`。
//!
//! ## 后端
//!
//! - `rusb_backend`（feature `rusb-backend`，默认）：基于 libusb
//! - `mock`（feature `mock`）：无硬件依赖，用于测试

use std::time::Duration;
use thiserror::Error;

// 重新导出 usbprint-protocol 中的 DeviceIdentity
pub use usbprint_protocol::DeviceIdentity;

pub mod channel;
pub mod device;
pub mod event;

#[cfg(feature = "rusb-backend")]
pub mod rusb_backend;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use channel::{BulkRoute, Channel, DropReason, WriteOutcome};
pub use device::{Direction, EndpointInfo, InterfaceInfo, TransferType, UsbDevice};
pub use event::{EventReceiver, EventSender, PlatformEvent, Subscription};

#[cfg(feature = "rusb-backend")]
pub use rusb_backend::{RusbBackend, RusbConfig};

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    Timeout,
    Pipe,
    Io,
    NotSupported,
    Backend,
}

/// 结构化 USB 错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct UsbError {
    pub kind: UsbErrorKind,
    pub message: String,
}

impl UsbError {
    pub fn new(kind: UsbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 设备已不可用（拔出或无权限），重试没有意义
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            UsbErrorKind::NoDevice | UsbErrorKind::AccessDenied | UsbErrorKind::NotFound
        )
    }
}

impl From<String> for UsbError {
    fn from(message: String) -> Self {
        Self::new(UsbErrorKind::Unknown, message)
    }
}

impl From<&str> for UsbError {
    fn from(message: &str) -> Self {
        Self::new(UsbErrorKind::Unknown, message)
    }
}

/// 已打开的设备连接
///
/// 连接被 drop 时关闭句柄，同时释放已声明的接口。
pub trait DeviceConnection: Send {
    /// 声明接口
    ///
    /// `force` 为 true 时先卸载占用该接口的内核驱动。
    fn claim_interface(&mut self, interface: u8, force: bool) -> Result<(), UsbError>;

    /// Bulk OUT 传输，`Duration::ZERO` 表示无限等待
    fn bulk_write(&mut self, endpoint: u8, data: &[u8], timeout: Duration)
    -> Result<usize, UsbError>;

    /// 控制 IN 传输，返回实际读取的字节数
    fn control_read(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;
}

/// 平台 USB 接口
///
/// 权限结果和拔出通知不通过返回值送达，而是以 [`PlatformEvent`]
/// 发送到 `subscribe` 时登记的通道，可能来自任意线程。
pub trait UsbBackend: Send + Sync {
    /// 枚举当前连接的设备
    fn devices(&self) -> Result<Vec<UsbDevice>, UsbError>;

    /// 打开设备
    fn open(&self, device: &UsbDevice) -> Result<Box<dyn DeviceConnection>, UsbError>;

    /// 是否已持有设备访问权限
    fn has_permission(&self, device: &UsbDevice) -> bool;

    /// 请求设备访问权限（结果以 `PlatformEvent::PermissionResult` 送达）
    fn request_permission(&self, device: &UsbDevice) -> Result<(), UsbError>;

    /// 订阅通知
    fn subscribe(&self, subscription: Subscription, sink: EventSender) -> Result<(), UsbError>;

    /// 取消订阅（未订阅时为空操作）
    fn unsubscribe(&self, subscription: Subscription);
}
