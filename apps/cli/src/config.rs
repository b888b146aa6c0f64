//! CLI 配置
//!
//! `config.toml` 默认位于 `<config_dir>/usbprint/`，可用 `--config` 覆盖。
//! 文件不存在时使用默认配置。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use usbprint_driver::DriverConfig;
use usbprint_usb::RusbConfig;

/// 默认连接超时（等待授权结果）
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// 默认配置文件路径
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Cannot determine config directory")?;
    path.push("usbprint");
    path.push("config.toml");
    Ok(path)
}

/// 解析配置文件路径（命令行优先）
pub fn resolve_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_file(),
    }
}

/// CLI 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 默认打印机名称（`<vendorId>_<deviceId>`）
    pub printer: Option<String>,

    /// 等待授权结果的超时（毫秒）
    pub connect_timeout_ms: u64,

    pub driver: DriverConfig,

    pub usb: RusbConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            printer: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            driver: DriverConfig::default(),
            usb: RusbConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, format!("# USBPrint CLI Configuration\n\n{}", content))
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.driver.charset, "GBK");
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CliConfig::default();
        config.printer = Some("1155_1002".to_string());
        config.driver.charset = "UTF-8".to_string();
        config.usb.detach_poll_interval_ms = 250;
        config.save(&path).unwrap();

        assert_eq!(CliConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "printer = \"1155_1002\"\n\n[driver]\nnotify_paper_out = false\n").unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.printer.as_deref(), Some("1155_1002"));
        assert!(!config.driver.notify_paper_out);
        assert_eq!(config.driver.charset, "GBK");
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
        assert!(config.usb.detach_kernel_driver);
    }
}
