//! 驱动配置

use usbprint_protocol::DEFAULT_CHARSET;

/// 驱动配置
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DriverConfig {
    /// 文本编码（`encoding_rs` 标签）
    pub charset: String,
    /// 缺纸时是否发出用户提示
    pub notify_paper_out: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            charset: DEFAULT_CHARSET.to_string(),
            notify_paper_out: true,
        }
    }
}
