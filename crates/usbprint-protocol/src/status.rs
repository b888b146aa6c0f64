//! 打印机状态查询
//!
//! 状态通过 class 控制传输读取（不走 bulk 端点），响应 2 字节，
//! 只解释第 0 字节。

use crate::constants::{STATUS_NO_PAPER, STATUS_REQUEST, STATUS_REQUEST_TYPE, STATUS_RESPONSE_LEN};

/// 控制传输参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: usize,
}

impl StatusRequest {
    /// 纸张状态查询（`0xA1`, `1`, 0, 0, 2 字节）
    pub const PAPER: StatusRequest = StatusRequest {
        request_type: STATUS_REQUEST_TYPE,
        request: STATUS_REQUEST,
        value: 0,
        index: 0,
        length: STATUS_RESPONSE_LEN,
    };
}

/// 纸张状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperStatus {
    Present,
    Empty,
}

impl PaperStatus {
    /// 解析状态字节
    ///
    /// 仅 `0x38` 表示缺纸。读取失败时上层得到的是 0 字节，
    /// 因此"未知"也会被当作有纸。
    pub fn from_status_byte(byte: u8) -> Self {
        if byte == STATUS_NO_PAPER {
            PaperStatus::Empty
        } else {
            PaperStatus::Present
        }
    }

    /// 解析完整响应（空响应按 0 字节处理）
    pub fn from_response(response: &[u8]) -> Self {
        Self::from_status_byte(response.first().copied().unwrap_or(0))
    }

    pub fn is_available(self) -> bool {
        self == PaperStatus::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_paper_request_layout() {
        let req = StatusRequest::PAPER;
        assert_eq!(req.request_type, 0xA1);
        assert_eq!(req.request, 1);
        assert_eq!(req.value, 0);
        assert_eq!(req.index, 0);
        assert_eq!(req.length, 2);
    }

    #[test]
    fn test_no_paper_byte() {
        assert_eq!(PaperStatus::from_status_byte(0x38), PaperStatus::Empty);
        assert!(!PaperStatus::from_response(&[0x38, 0x00]).is_available());
    }

    #[test]
    fn test_failed_read_means_present() {
        // 读取失败时返回全 0 缓冲区或空缓冲区
        assert!(PaperStatus::from_response(&[0, 0]).is_available());
        assert!(PaperStatus::from_response(&[]).is_available());
    }

    #[test]
    fn test_only_first_byte_is_interpreted() {
        assert!(PaperStatus::from_response(&[0x00, 0x38]).is_available());
    }

    proptest! {
        #[test]
        fn prop_empty_iff_0x38(byte in any::<u8>(), tail in any::<u8>()) {
            let status = PaperStatus::from_response(&[byte, tail]);
            prop_assert_eq!(status.is_available(), byte != 0x38);
        }
    }
}
