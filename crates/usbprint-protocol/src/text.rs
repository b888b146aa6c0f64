//! 文本消息编码
//!
//! 文本按指定字符集编码后原样发送，结束符 `CR LF` 由调用方单独发送。
//! 字符集标签无法识别时回退到 UTF-8（平台默认编码），不会导致发送失败。

use encoding_rs::{Encoding, UTF_8};
use tracing::warn;

/// 编码结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    /// 编码后的字节（不含结束符）
    pub bytes: Vec<u8>,
    /// 实际使用的编码名称
    pub encoding: &'static str,
    /// 是否回退到了默认编码
    pub fell_back: bool,
}

impl EncodedText {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 按字符集标签编码文本
///
/// - 空字符串返回空字节
/// - GBK 中无法表示的字符由 `encoding_rs` 替换为数字字符引用
pub fn encode_text(message: &str, charset: &str) -> EncodedText {
    let (encoding, fell_back) = match Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => (encoding, false),
        None => {
            warn!(charset, "Unknown charset, falling back to UTF-8");
            (UTF_8, true)
        },
    };

    if message.is_empty() {
        return EncodedText {
            bytes: Vec::new(),
            encoding: encoding.name(),
            fell_back,
        };
    }

    let (bytes, used, _) = encoding.encode(message);
    EncodedText {
        bytes: bytes.into_owned(),
        encoding: used.name(),
        fell_back,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbk_encoding() {
        let encoded = encode_text("中文", "GBK");
        assert_eq!(encoded.bytes, vec![0xD6, 0xD0, 0xCE, 0xC4]);
        assert_eq!(encoded.encoding, "GBK");
        assert!(!encoded.fell_back);
    }

    #[test]
    fn test_ascii_is_unchanged() {
        let encoded = encode_text("Total: 12.50", "gbk");
        assert_eq!(encoded.bytes, b"Total: 12.50".to_vec());
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        let encoded = encode_text("é", "no-such-charset");
        assert_eq!(encoded.bytes, "é".as_bytes().to_vec());
        assert_eq!(encoded.encoding, "UTF-8");
        assert!(encoded.fell_back);
    }

    #[test]
    fn test_empty_message() {
        let encoded = encode_text("", "GBK");
        assert!(encoded.is_empty());
    }
}
