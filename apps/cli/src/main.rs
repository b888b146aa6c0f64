//! # USBPrint CLI
//!
//! Command-line interface for USB thermal printers.
//!
//! ## One-shot 模式
//!
//! 每个命令独立执行：连接 → 操作 → 断开。首次连接时平台可能需要授权，
//! 命令会等待授权结果（`connect_timeout_ms`）。
//!
//! ```bash
//! # 查看打印机
//! usbprint-cli list
//!
//! # 配置默认打印机
//! usbprint-cli config set --printer 1155_1002
//!
//! # 打印并切纸
//! usbprint-cli print "Hello" --cut
//!
//! # 发送原始 ESC/POS 命令
//! usbprint-cli send "1b 40"
//!
//! # 持续监视连接状态（Ctrl+C 退出）
//! usbprint-cli watch --paper-interval-ms 1000
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod oneshot;

use commands::{
    BuzzCommand, ConfigCommand, CutCommand, ListCommand, PrintCommand, PrinterArgs, SendCommand,
    WatchCommand,
};
use config::CliConfig;
use oneshot::Runtime;

/// USBPrint CLI - USB 热敏打印机命令行工具
#[derive(Parser, Debug)]
#[command(name = "usbprint-cli")]
#[command(about = "Command-line interface for USB thermal printers", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 <config_dir>/usbprint/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 列出 USB 打印机
    List {
        #[command(flatten)]
        args: ListCommand,
    },

    /// 打印文本
    Print {
        #[command(flatten)]
        args: PrintCommand,
    },

    /// 发送原始命令（十六进制）
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// 查询是否有纸
    Status {
        #[command(flatten)]
        target: PrinterArgs,
    },

    /// 切纸
    Cut {
        #[command(flatten)]
        args: CutCommand,
    },

    /// 打开钱箱
    Drawer {
        #[command(flatten)]
        target: PrinterArgs,
    },

    /// 蜂鸣器
    Buzz {
        #[command(flatten)]
        args: BuzzCommand,
    },

    /// 监视打印机连接
    Watch {
        #[command(flatten)]
        args: WatchCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志（输出到 stderr，stdout 留给命令结果）
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("usbprint_cli=info,usbprint_driver=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = config::resolve_config_file(cli.config.as_deref())?;
    let config = CliConfig::load(&config_path)?;

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path),
        Commands::List { args } => args.execute(&Runtime::new(&config)?),
        Commands::Print { args } => args.execute(&Runtime::new(&config)?, &config),
        Commands::Send { args } => args.execute(&Runtime::new(&config)?, &config),
        Commands::Status { target } => {
            commands::printer::status(&target, &Runtime::new(&config)?, &config)
        },
        Commands::Cut { args } => args.execute(&Runtime::new(&config)?, &config),
        Commands::Drawer { target } => {
            commands::printer::drawer(&target, &Runtime::new(&config)?, &config)
        },
        Commands::Buzz { args } => args.execute(&Runtime::new(&config)?, &config),
        Commands::Watch { args } => args.execute(&Runtime::new(&config)?, &config),
    }
}
