//! 监视打印机连接
//!
//! 连接后持续输出会话通知（包括拔出），直到 Ctrl+C。

use anyhow::Result;
use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use usbprint_driver::SessionNotice;

use super::PrinterArgs;
use crate::config::CliConfig;
use crate::oneshot::Runtime;

/// 监视打印机
#[derive(Args, Debug)]
pub struct WatchCommand {
    #[command(flatten)]
    pub target: PrinterArgs,

    /// 定时查询纸张状态的间隔（毫秒，0 表示不查询）
    #[arg(long, default_value_t = 0)]
    pub paper_interval_ms: u64,
}

impl WatchCommand {
    pub fn execute(&self, runtime: &Runtime, config: &CliConfig) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            println!("\n🛑 Stopping...");
            r.store(false, Ordering::SeqCst);
        })?;

        let name = runtime.resolve_printer(self.target.printer.as_deref(), config)?;
        let notices = runtime.connect(&name, config)?;
        println!("✅ {} connected (Ctrl+C to stop)", name);

        let tick = Duration::from_millis(200);
        let paper_every = Duration::from_millis(self.paper_interval_ms);
        let mut since_paper = Duration::ZERO;
        let mut last_paper = None;

        while running.load(Ordering::SeqCst) {
            match notices.recv_timeout(tick) {
                Ok(SessionNotice::Connected) => println!("✅ {} connected", name),
                Ok(SessionNotice::Disconnected(reason)) => {
                    println!("❌ {} disconnected ({:?})", name, reason);
                    return Ok(());
                },
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }

            if self.paper_interval_ms > 0 {
                since_paper += tick;
                if since_paper >= paper_every {
                    since_paper = Duration::ZERO;
                    if let Ok(available) = runtime.registry.is_paper_available(&name)
                        && last_paper != Some(available)
                    {
                        println!("📄 paper available: {}", available);
                        last_paper = Some(available);
                    }
                }
            }
        }

        let _ = runtime.registry.disconnect(&name);
        Ok(())
    }
}
