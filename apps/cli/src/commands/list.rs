//! 列出打印机

use anyhow::Result;
use clap::Args;

use crate::oneshot::Runtime;

/// 列出当前插入的 USB 打印机
#[derive(Args, Debug)]
pub struct ListCommand {
    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

impl ListCommand {
    pub fn execute(&self, runtime: &Runtime) -> Result<()> {
        let printers = runtime.registry.list_candidates()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&printers)?);
            return Ok(());
        }

        if printers.is_empty() {
            println!("No USB printer found");
            return Ok(());
        }

        println!("{:<14} {:>6} {:>6} {:>8}  CLASS", "NAME", "VID", "PID", "DEVICE");
        for printer in &printers {
            println!(
                "{:<14} 0x{:04X} 0x{:04X} {:>8}  {}",
                printer.printer_name,
                printer.vendor_id,
                printer.product_id,
                printer.device_id,
                printer.class().description()
            );
        }
        Ok(())
    }
}
