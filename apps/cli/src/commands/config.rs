//! 配置管理命令
//!
//! 用于管理 CLI 配置（默认打印机、字符集、超时等）

use anyhow::{Result, bail};
use clap::Subcommand;
use std::path::Path;

use crate::config::CliConfig;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 默认打印机名称（<vendorId>_<deviceId>）
        #[arg(short, long)]
        printer: Option<String>,

        /// 文本字符集（如 GBK、UTF-8）
        #[arg(short, long)]
        charset: Option<String>,

        /// 等待授权的超时（毫秒）
        #[arg(long)]
        connect_timeout_ms: Option<u64>,

        /// 缺纸时是否提示
        #[arg(long)]
        notify_paper_out: Option<bool>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                printer,
                charset,
                connect_timeout_ms,
                notify_paper_out,
            } => Self::set_(path, printer, charset, connect_timeout_ms, notify_paper_out),

            ConfigCommand::Get { key } => Self::get_(path, &key),

            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }

    fn set_(
        path: &Path,
        printer: Option<String>,
        charset: Option<String>,
        connect_timeout_ms: Option<u64>,
        notify_paper_out: Option<bool>,
    ) -> Result<()> {
        let mut config = CliConfig::load(path)?;

        if let Some(printer) = printer {
            if printer.parse::<usbprint_protocol::DeviceIdentity>().is_err() {
                bail!("Invalid printer name {:?}, expected <vendorId>_<deviceId>", printer);
            }
            println!("✅ Default printer: {}", printer);
            config.printer = Some(printer);
        }

        if let Some(charset) = charset {
            println!("✅ Charset: {}", charset);
            config.driver.charset = charset;
        }

        if let Some(timeout) = connect_timeout_ms {
            println!("✅ Connect timeout: {} ms", timeout);
            config.connect_timeout_ms = timeout;
        }

        if let Some(notify) = notify_paper_out {
            println!("✅ Notify paper out: {}", notify);
            config.driver.notify_paper_out = notify;
        }

        config.save(path)
    }

    fn get_(path: &Path, key: &str) -> Result<()> {
        let config = CliConfig::load(path)?;

        match key {
            "printer" => match &config.printer {
                Some(printer) => println!("{}", printer),
                None => println!("(not set)"),
            },
            "charset" => println!("{}", config.driver.charset),
            "connect_timeout_ms" => println!("{}", config.connect_timeout_ms),
            "notify_paper_out" => println!("{}", config.driver.notify_paper_out),
            "all" => print!("{}", toml::to_string_pretty(&config)?),
            other => bail!("Unknown config key: {}", other),
        }

        Ok(())
    }
}
