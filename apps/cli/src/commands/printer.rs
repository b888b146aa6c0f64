//! 打印机操作命令
//!
//! 每个命令连接一台打印机、执行一次操作后断开。

use anyhow::{Context, Result};
use clap::Args;

use crate::config::CliConfig;
use crate::oneshot::Runtime;

/// 打印机选择参数
#[derive(Args, Debug, Clone, Default)]
pub struct PrinterArgs {
    /// 打印机名称（覆盖配置），如 1155_1002
    #[arg(short, long)]
    pub printer: Option<String>,
}

/// 打印文本
#[derive(Args, Debug)]
pub struct PrintCommand {
    #[command(flatten)]
    pub target: PrinterArgs,

    /// 文本内容（自动追加换行）
    pub message: String,

    /// 打印后切纸
    #[arg(long)]
    pub cut: bool,
}

impl PrintCommand {
    pub fn execute(&self, runtime: &Runtime, config: &CliConfig) -> Result<()> {
        runtime.with_printer(self.target.printer.as_deref(), config, |registry, name| {
            registry.print(name, &self.message)?;
            if self.cut {
                registry.cut_paper(name)?;
            }
            println!("Printed");
            Ok(())
        })
    }
}

/// 发送十六进制原始命令
#[derive(Args, Debug)]
pub struct SendCommand {
    #[command(flatten)]
    pub target: PrinterArgs,

    /// 十六进制字节，如 1b40 或 "1b 40"
    pub hex: String,
}

impl SendCommand {
    pub fn parse_bytes(&self) -> Result<Vec<u8>> {
        let compact: String = self.hex.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(&compact).with_context(|| format!("Invalid hex command: {:?}", self.hex))
    }

    pub fn execute(&self, runtime: &Runtime, config: &CliConfig) -> Result<()> {
        let bytes = self.parse_bytes()?;
        runtime.with_printer(self.target.printer.as_deref(), config, |registry, name| {
            registry.send_command(name, &bytes)?;
            println!("Send");
            Ok(())
        })
    }
}

/// 切纸
#[derive(Args, Debug)]
pub struct CutCommand {
    #[command(flatten)]
    pub target: PrinterArgs,

    /// 切纸模式：0 全切，1 半切（不指定则进纸后切纸）
    #[arg(short, long)]
    pub mode: Option<i32>,
}

impl CutCommand {
    pub fn execute(&self, runtime: &Runtime, config: &CliConfig) -> Result<()> {
        runtime.with_printer(self.target.printer.as_deref(), config, |registry, name| {
            match self.mode {
                Some(mode) => registry.cut_by_mode(name, mode)?,
                None => registry.cut_paper(name)?,
            }
            Ok(())
        })
    }
}

/// 蜂鸣器
#[derive(Args, Debug)]
pub struct BuzzCommand {
    #[command(flatten)]
    pub target: PrinterArgs,

    /// 蜂鸣次数（与 --duration 一起使用）
    #[arg(short, long, requires = "duration")]
    pub count: Option<i32>,

    /// 单次时长
    #[arg(short, long, requires = "count")]
    pub duration: Option<i32>,

    /// 设置蜂鸣模式而不是立即蜂鸣
    #[arg(long, requires = "count")]
    pub mode: Option<i32>,
}

impl BuzzCommand {
    pub fn execute(&self, runtime: &Runtime, config: &CliConfig) -> Result<()> {
        runtime.with_printer(self.target.printer.as_deref(), config, |registry, name| {
            match (self.count, self.duration, self.mode) {
                (Some(count), Some(duration), Some(mode)) => {
                    registry.set_buzzer_mode(name, count, duration, mode)?
                },
                (Some(count), Some(duration), None) => registry.buzzer(name, count, duration)?,
                _ => registry.default_buzzer(name)?,
            }
            Ok(())
        })
    }
}

/// 查询纸张状态
pub fn status(target: &PrinterArgs, runtime: &Runtime, config: &CliConfig) -> Result<()> {
    runtime.with_printer(target.printer.as_deref(), config, |registry, name| {
        println!("{}", registry.is_paper_available(name)?);
        Ok(())
    })
}

/// 打开钱箱
pub fn drawer(target: &PrinterArgs, runtime: &Runtime, config: &CliConfig) -> Result<()> {
    runtime.with_printer(target.printer.as_deref(), config, |registry, name| {
        registry.open_cash_box(name)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(hex: &str) -> SendCommand {
        SendCommand {
            target: PrinterArgs::default(),
            hex: hex.to_string(),
        }
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(send("1b40").parse_bytes().unwrap(), vec![0x1B, 0x40]);
        assert_eq!(send("1D 56 42 00").parse_bytes().unwrap(), vec![0x1D, 0x56, 0x42, 0x00]);
    }

    #[test]
    fn test_parse_invalid_hex() {
        assert!(send("zz").parse_bytes().is_err());
        assert!(send("1b4").parse_bytes().is_err());
    }
}
