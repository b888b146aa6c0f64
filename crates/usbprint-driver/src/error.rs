//! 驱动层错误类型定义

use thiserror::Error;
use usbprint_usb::UsbError;

/// 驱动层错误类型
///
/// 只包含调用方需要处理的业务错误。传输层失败（打开、声明、传输）
/// 在通道内部记录日志后吞掉，不会出现在这里。
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// 名称无效，或没有该名称的打印机
    #[error("No printer of specified name is connected: {0}")]
    NotFound(String),

    /// 缺纸
    #[error("Paper roll is empty in printer {0}")]
    PaperOut(String),

    /// 枚举设备失败
    #[error("USB platform error: {0}")]
    Platform(#[from] UsbError),
}

impl DriverError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound(_))
    }

    pub fn is_paper_out(&self) -> bool {
        matches!(self, DriverError::PaperOut(_))
    }
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use usbprint_usb::{UsbError, UsbErrorKind};

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::NotFound("1155_1002".to_string());
        assert_eq!(
            err.to_string(),
            "No printer of specified name is connected: 1155_1002"
        );

        let err = DriverError::PaperOut("1155_1002".to_string());
        assert!(err.to_string().starts_with("Paper roll is empty"));

        let err = DriverError::Platform(UsbError::new(UsbErrorKind::Io, "enumeration failed"));
        assert!(err.to_string().contains("enumeration failed"));
    }

    #[test]
    fn test_paper_out_distinguishable_from_not_found() {
        let paper = DriverError::PaperOut("a".to_string());
        let missing = DriverError::NotFound("a".to_string());
        assert!(paper.is_paper_out() && !paper.is_not_found());
        assert!(missing.is_not_found() && !missing.is_paper_out());
    }

    #[test]
    fn test_from_usb_error() {
        let err: DriverError = UsbError::new(UsbErrorKind::AccessDenied, "denied").into();
        match err {
            DriverError::Platform(e) => assert_eq!(e.kind, UsbErrorKind::AccessDenied),
            _ => panic!("Expected Platform variant"),
        }
    }
}
