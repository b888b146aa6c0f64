//! 协议常量定义
//!
//! 集中定义所有硬件相关的常量，避免在代码中散落"魔法数"。

/// ESC 前缀（0x1B）
pub const ESC: u8 = 0x1B;

/// GS 前缀（0x1D）
pub const GS: u8 = 0x1D;

/// 文本消息结束符（CR LF）
pub const LINE_TERMINATOR: [u8; 2] = [0x0D, 0x0A];

/// 默认文本字符集
///
/// 大多数国产热敏打印机使用 GBK。
pub const DEFAULT_CHARSET: &str = "GBK";

/// 打印机状态查询：bmRequestType（Device-to-Host | Class | Interface）
pub const STATUS_REQUEST_TYPE: u8 = 0xA1;

/// 打印机状态查询：bRequest
pub const STATUS_REQUEST: u8 = 0x01;

/// 打印机状态查询：响应长度（字节）
pub const STATUS_RESPONSE_LEN: usize = 2;

/// 状态字节：缺纸
///
/// ⚠️ 厂商相关的取值，未见于公开文档，仅按现有设备行为使用。
pub const STATUS_NO_PAPER: u8 = 0x38;

/// USB 打印机类别码（bInterfaceClass / bDeviceClass）
pub const USB_CLASS_PRINTER: u8 = 0x07;
