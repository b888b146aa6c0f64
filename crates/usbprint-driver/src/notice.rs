//! 通知
//!
//! 两类通知：
//!
//! - [`SessionNotice`]：发给 `connect` 调用方的会话事件，经 crossbeam 通道送达。
//!   授权结果是异步的，所以连接成功或失败都只能通过这里得知。
//! - [`UserNotice`]：面向最终用户的提示（打印机拔出、缺纸），交给
//!   [`UserNotifier`] 展示。默认实现 [`LogNotifier`] 只写日志。

use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use tracing::{info, warn};

/// 会话断开原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// 调用方主动断开
    Requested,
    /// 用户拒绝授权
    PermissionDenied,
    /// 设备被拔出
    Detached,
    /// 注册表关闭
    Shutdown,
}

/// 会话通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    Connected,
    /// 终止通知，之后通道关闭
    Disconnected(DisconnectReason),
}

pub type NoticeSender = Sender<SessionNotice>;
pub type NoticeReceiver = Receiver<SessionNotice>;

/// 面向用户的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserNotice {
    PrinterDetached { name: String },
    PaperOut { name: String },
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserNotice::PrinterDetached { name } => write!(f, "Printer {} detached", name),
            UserNotice::PaperOut { name } => write!(
                f,
                "Paper roll is empty in printer {}. Please place some paper before printing any data.",
                name
            ),
        }
    }
}

/// 用户提示接口
///
/// 可能在事件线程上调用，实现不应长时间阻塞。
pub trait UserNotifier: Send + Sync {
    fn notify(&self, notice: &UserNotice);
}

/// 把提示写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl UserNotifier for LogNotifier {
    fn notify(&self, notice: &UserNotice) {
        match notice {
            UserNotice::PrinterDetached { .. } => info!("{}", notice),
            UserNotice::PaperOut { .. } => warn!("{}", notice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_notice_names_printer() {
        let notice = UserNotice::PrinterDetached {
            name: "1155_1002".to_string(),
        };
        assert_eq!(notice.to_string(), "Printer 1155_1002 detached");

        let notice = UserNotice::PaperOut {
            name: "1155_1002".to_string(),
        };
        assert!(notice.to_string().contains("1155_1002"));
    }
}
