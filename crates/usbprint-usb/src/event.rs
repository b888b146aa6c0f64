//! 平台事件
//!
//! 平台回调统一转换为 [`PlatformEvent`]，经 crossbeam 通道送达消费方。

use crossbeam_channel::{Receiver, Sender};
use usbprint_protocol::DeviceIdentity;

/// 平台事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    /// 权限请求结果
    PermissionResult {
        identity: DeviceIdentity,
        granted: bool,
    },
    /// 设备被拔出
    Detached { identity: DeviceIdentity },
}

impl PlatformEvent {
    pub fn identity(&self) -> DeviceIdentity {
        match self {
            PlatformEvent::PermissionResult { identity, .. } => *identity,
            PlatformEvent::Detached { identity } => *identity,
        }
    }
}

/// 通知类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscription {
    /// 权限请求结果
    Permission,
    /// 设备拔出
    Detach,
}

pub type EventSender = Sender<PlatformEvent>;
pub type EventReceiver = Receiver<PlatformEvent>;
