//! # USBPrint Driver
//!
//! USB 热敏打印机的连接生命周期和命令分发：
//!
//! - [`SessionRegistry`]：打印机名称 → 会话，连接/断开/拔出/关闭
//! - [`PermissionNegotiator`]：异步授权状态机
//! - [`PrinterSession`]：单台打印机的打印、状态查询、切纸等操作
//! - [`EventPump`]：后台消费平台事件
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use usbprint_driver::{EventPump, SessionNotice, SessionRegistry};
//! use usbprint_usb::RusbBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(SessionRegistry::new(Arc::new(RusbBackend::new())));
//! let _pump = EventPump::start(registry.clone())?;
//!
//! let printer = registry.list_candidates()?.remove(0).printer_name;
//! let notices = registry.connect(&printer)?;
//! if notices.recv()? == SessionNotice::Connected {
//!     registry.print(&printer, "Hello")?;
//!     registry.cut_paper(&printer)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod negotiator;
pub mod notice;
pub mod pump;
pub mod registry;
pub mod session;

pub use config::DriverConfig;
pub use error::DriverError;
pub use negotiator::{PermissionNegotiator, PermissionState};
pub use notice::{
    DisconnectReason, LogNotifier, NoticeReceiver, NoticeSender, SessionNotice, UserNotice,
    UserNotifier,
};
pub use pump::EventPump;
pub use registry::{PrinterInfo, SessionRegistry};
pub use session::PrinterSession;

pub use usbprint_protocol::DeviceIdentity;
