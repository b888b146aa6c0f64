//! 控制命令编码
//!
//! 每条命令都是定长字节序列，发送前无需额外封装。
//!
//! | 命令 | 字节 |
//! |---|---|
//! | 切纸（进纸后切） | `1D 56 42 n` |
//! | 按模式切纸 | `1D 56 30` / `1D 56 31` |
//! | 开钱箱 | `1B 70 00 40 50` |
//! | 默认蜂鸣 | `1B 42 04 01` |
//! | 自定义蜂鸣 | `1B 42 count duration` |
//! | 蜂鸣模式 | `1B 43 count duration mode` |

use crate::ProtocolError;
use crate::constants::{ESC, GS};

// ============================================================================
// 切纸模式
// ============================================================================

/// 切纸模式（`GS V m`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum CutMode {
    /// 全切
    #[default]
    Full = 0x30,
    /// 半切
    Partial = 0x31,
}

impl CutMode {
    /// 编码为 `GS V m`
    pub fn to_bytes(self) -> [u8; 3] {
        [GS, 0x56, self.into()]
    }
}

impl TryFrom<i32> for CutMode {
    type Error = ProtocolError;

    /// 0 = 全切，1 = 半切，其余取值无效
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CutMode::Full),
            1 => Ok(CutMode::Partial),
            _ => Err(ProtocolError::InvalidValue {
                field: "CutMode".to_string(),
                value,
            }),
        }
    }
}

/// 按原始模式值生成切纸字节
///
/// 无效模式不产生任何字节（返回 `None`），调用方应当不发送。
pub fn cut_by_mode_bytes(mode: i32) -> Option<[u8; 3]> {
    CutMode::try_from(mode).ok().map(CutMode::to_bytes)
}

// ============================================================================
// 命令
// ============================================================================

/// 打印机控制命令
///
/// 整数参数统一截断为低 8 位，与设备端单字节参数一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterCommand {
    /// 进纸后切纸（`GS V B n`）
    CutPaper { feed: u8 },
    /// 按模式切纸（`GS V m`）
    CutByMode(CutMode),
    /// 开钱箱（固定脉冲）
    OpenCashBox,
    /// 默认蜂鸣（4 次，单位时长 1）
    DefaultBuzzer,
    /// 自定义蜂鸣
    Buzzer { count: u8, duration: u8 },
    /// 设置蜂鸣模式
    BuzzerMode { count: u8, duration: u8, mode: u8 },
}

impl PrinterCommand {
    /// 创建切纸命令（`n` 截断为一个字节）
    pub fn cut_paper(n: i32) -> Self {
        Self::CutPaper { feed: n as u8 }
    }

    /// 创建自定义蜂鸣命令
    pub fn buzzer(count: i32, duration: i32) -> Self {
        Self::Buzzer {
            count: count as u8,
            duration: duration as u8,
        }
    }

    /// 创建蜂鸣模式命令
    pub fn buzzer_mode(count: i32, duration: i32, mode: i32) -> Self {
        Self::BuzzerMode {
            count: count as u8,
            duration: duration as u8,
            mode: mode as u8,
        }
    }

    /// 编码为字节序列
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            Self::CutPaper { feed } => vec![GS, 0x56, 0x42, feed],
            Self::CutByMode(mode) => mode.to_bytes().to_vec(),
            Self::OpenCashBox => vec![ESC, 0x70, 0x00, 0x40, 0x50],
            Self::DefaultBuzzer => vec![ESC, 0x42, 0x04, 0x01],
            Self::Buzzer { count, duration } => vec![ESC, 0x42, count, duration],
            Self::BuzzerMode {
                count,
                duration,
                mode,
            } => vec![ESC, 0x43, count, duration, mode],
        }
    }
}
