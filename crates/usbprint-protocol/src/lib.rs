//! # USBPrint Protocol
//!
//! 热敏打印机命令协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量定义（ESC/POS 前缀、状态查询参数、USB 类别码）
//! - `command`: 控制命令编码（切纸、钱箱、蜂鸣器）
//! - `status`: 状态字节解析（缺纸检测）
//! - `text`: 文本消息编码（GBK/UTF-8）
//! - `identity`: 设备标识（`<vendorId>_<deviceId>`）
//! - `class`: USB 设备类别表
//!
//! 所有命令都是定长字节序列，由调用方通过 bulk OUT 端点原样发送。

pub mod class;
pub mod command;
pub mod constants;
pub mod identity;
pub mod status;
pub mod text;

// 重新导出常用类型
pub use class::UsbClass;
pub use command::{CutMode, PrinterCommand, cut_by_mode_bytes};
pub use constants::*;
pub use identity::DeviceIdentity;
pub use status::{PaperStatus, StatusRequest};
pub use text::{EncodedText, encode_text};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid printer name: {0:?}")]
    InvalidPrinterName(String),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: i32 },
}
