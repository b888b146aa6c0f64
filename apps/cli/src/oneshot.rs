//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置
//! 2. 连接打印机（必要时等待授权）
//! 3. 执行操作
//! 4. 断开连接

use anyhow::{Result, anyhow, bail};
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use tracing::debug;

use usbprint_driver::{
    DisconnectReason, EventPump, NoticeReceiver, SessionNotice, SessionRegistry,
};
use usbprint_usb::RusbBackend;

use crate::config::CliConfig;

/// 注册表和事件线程
pub struct Runtime {
    pub registry: Arc<SessionRegistry>,
    pump: Option<EventPump>,
}

impl Runtime {
    pub fn new(config: &CliConfig) -> Result<Self> {
        let backend = Arc::new(RusbBackend::with_config(config.usb.clone()));
        let registry = Arc::new(SessionRegistry::new(backend).with_config(config.driver.clone()));
        let pump = EventPump::start(registry.clone())?;
        Ok(Self {
            registry,
            pump: Some(pump),
        })
    }

    /// 确定打印机名称：命令行 > 配置 > 唯一的候选打印机
    pub fn resolve_printer(&self, explicit: Option<&str>, config: &CliConfig) -> Result<String> {
        if let Some(name) = explicit.or(config.printer.as_deref()) {
            return Ok(name.to_string());
        }

        let mut candidates = self.registry.list_candidates()?;
        match candidates.len() {
            0 => bail!("No USB printer found"),
            1 => Ok(candidates.remove(0).printer_name),
            n => bail!(
                "{} printers found, choose one with --printer or `config set --printer`",
                n
            ),
        }
    }

    /// 连接并等待 `Connected`
    pub fn connect(&self, name: &str, config: &CliConfig) -> Result<NoticeReceiver> {
        let notices = self.registry.connect(name)?;
        debug!(printer = name, "Waiting for connection");

        match notices.recv_timeout(config.connect_timeout()) {
            Ok(SessionNotice::Connected) => Ok(notices),
            Ok(SessionNotice::Disconnected(DisconnectReason::PermissionDenied)) => {
                Err(anyhow!("Permission denied for printer {}", name))
            },
            Ok(SessionNotice::Disconnected(reason)) => {
                Err(anyhow!("Printer {} disconnected ({:?})", name, reason))
            },
            Err(RecvTimeoutError::Timeout) => {
                let _ = self.registry.disconnect(name);
                Err(anyhow!(
                    "Timed out after {:?} waiting for printer {}",
                    config.connect_timeout(),
                    name
                ))
            },
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("Printer {} closed before connecting", name))
            },
        }
    }

    /// 连接、执行、断开
    pub fn with_printer<T>(
        &self,
        explicit: Option<&str>,
        config: &CliConfig,
        f: impl FnOnce(&SessionRegistry, &str) -> Result<T>,
    ) -> Result<T> {
        let name = self.resolve_printer(explicit, config)?;
        let _notices = self.connect(&name, config)?;
        let result = f(&self.registry, &name);
        let _ = self.registry.disconnect(&name);
        result
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // 先停事件线程，再关闭注册表
        if let Some(mut pump) = self.pump.take() {
            pump.stop();
        }
        self.registry.teardown();
    }
}
