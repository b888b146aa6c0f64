//! 打印通道
//!
//! 把一个设备句柄变成可写通道：打开连接、在第一个接口上查找
//! Bulk OUT 端点、声明接口，之后的写入复用同一个端点。
//!
//! **尽力而为策略**：通道打不开、找不到端点或声明失败时，写入被静默丢弃；
//! 控制读失败时关闭通道并返回全 0 缓冲区。调用方只能从
//! [`WriteOutcome`] 和日志观察到这些失败。

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::device::UsbDevice;
use crate::{DeviceConnection, UsbBackend, UsbError};

/// Bulk 传输超时：0 表示无限等待
const BULK_TIMEOUT: Duration = Duration::ZERO;

/// 控制传输超时：0 表示无限等待
const CONTROL_TIMEOUT: Duration = Duration::ZERO;

/// 已声明的接口和 Bulk OUT 端点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkRoute {
    pub interface: u8,
    pub endpoint: u8,
}

/// 写入被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 打开设备失败
    OpenFailed,
    /// 设备没有接口
    NoInterface,
    /// 第一个接口上没有 Bulk OUT 端点
    NoBulkOutEndpoint,
    /// 声明接口失败
    ClaimFailed,
    /// 传输失败
    TransferFailed,
}

/// 写入结果（仅用于诊断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Sent(usize),
    Dropped(DropReason),
}

impl WriteOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, WriteOutcome::Sent(_))
    }
}

/// 打印通道
pub struct Channel {
    backend: Arc<dyn UsbBackend>,
    device: UsbDevice,
    connection: Option<Box<dyn DeviceConnection>>,
    route: Option<BulkRoute>,
}

impl Channel {
    /// 创建通道（不打开设备）
    pub fn new(backend: Arc<dyn UsbBackend>, device: UsbDevice) -> Self {
        Self {
            backend,
            device,
            connection: None,
            route: None,
        }
    }

    pub fn device(&self) -> &UsbDevice {
        &self.device
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// 已解析的端点（声明成功后才有值）
    pub fn route(&self) -> Option<BulkRoute> {
        self.route
    }

    /// 打开设备连接（已打开时为空操作）
    pub fn open(&mut self) -> Result<(), UsbError> {
        if self.connection.is_none() {
            let connection = self.backend.open(&self.device)?;
            debug!(printer = %self.device.identity, "USB connection opened");
            self.connection = Some(connection);
        }
        Ok(())
    }

    /// 解析并声明 Bulk OUT 端点
    ///
    /// 只看第一个接口，取第一个 Bulk OUT 端点。声明失败时不保存端点，
    /// 下一次写入会重新解析。
    pub fn ensure_endpoint(&mut self) -> Result<BulkRoute, DropReason> {
        if let Some(route) = self.route {
            return Ok(route);
        }

        if let Err(e) = self.open() {
            warn!(printer = %self.device.identity, error = %e, "Failed to open USB device");
            return Err(DropReason::OpenFailed);
        }

        let interface = self.device.interfaces.first().ok_or(DropReason::NoInterface)?;
        let endpoint = interface.first_bulk_out().ok_or(DropReason::NoBulkOutEndpoint)?;
        let route = BulkRoute {
            interface: interface.number,
            endpoint: endpoint.address,
        };

        let connection = self.connection.as_mut().ok_or(DropReason::OpenFailed)?;
        if let Err(e) = connection.claim_interface(route.interface, true) {
            warn!(
                printer = %self.device.identity,
                interface = route.interface,
                error = %e,
                "Failed to claim interface"
            );
            return Err(DropReason::ClaimFailed);
        }

        debug!(
            printer = %self.device.identity,
            interface = route.interface,
            endpoint = format_args!("0x{:02X}", route.endpoint),
            "Bulk OUT endpoint claimed"
        );
        self.route = Some(route);
        Ok(route)
    }

    /// 写入字节（失败时静默丢弃）
    pub fn write(&mut self, data: &[u8]) -> WriteOutcome {
        let route = match self.ensure_endpoint() {
            Ok(route) => route,
            Err(reason) => {
                warn!(
                    printer = %self.device.identity,
                    len = data.len(),
                    ?reason,
                    "Channel unusable, write dropped"
                );
                return WriteOutcome::Dropped(reason);
            },
        };

        let Some(connection) = self.connection.as_mut() else {
            return WriteOutcome::Dropped(DropReason::OpenFailed);
        };

        match connection.bulk_write(route.endpoint, data, BULK_TIMEOUT) {
            Ok(written) => {
                trace!(printer = %self.device.identity, written, "Bulk write done");
                WriteOutcome::Sent(written)
            },
            Err(e) => {
                warn!(printer = %self.device.identity, error = %e, "Bulk write failed, dropped");
                WriteOutcome::Dropped(DropReason::TransferFailed)
            },
        }
    }

    /// 控制读
    ///
    /// 任何失败都会关闭通道并返回长度为 `length` 的全 0 缓冲区。
    pub fn control_read(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
    ) -> Vec<u8> {
        if let Err(e) = self.open() {
            warn!(printer = %self.device.identity, error = %e, "Failed to open USB device for control read");
            self.close();
            return vec![0u8; length];
        }

        let mut buf = vec![0u8; length];
        let result = match self.connection.as_mut() {
            Some(connection) => connection.control_read(
                request_type,
                request,
                value,
                index,
                &mut buf,
                CONTROL_TIMEOUT,
            ),
            None => Err(UsbError::from("connection not open")),
        };

        match result {
            Ok(len) => {
                trace!(printer = %self.device.identity, len, "Control read done");
                buf
            },
            Err(e) => {
                warn!(printer = %self.device.identity, error = %e, "Control read failed, closing channel");
                self.close();
                vec![0u8; length]
            },
        }
    }

    /// 关闭通道（幂等）
    ///
    /// 关闭连接即释放已声明的接口。
    pub fn close(&mut self) {
        self.route = None;
        if self.connection.take().is_some() {
            debug!(printer = %self.device.identity, "USB connection closed");
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("device", &self.device.identity)
            .field("open", &self.is_open())
            .field("route", &self.route)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockStatus};
    use crate::{EndpointInfo, InterfaceInfo, TransferType};
    use usbprint_protocol::DeviceIdentity;

    fn setup() -> (Arc<MockBackend>, UsbDevice) {
        let backend = Arc::new(MockBackend::new());
        let device = MockBackend::printer(DeviceIdentity::new(1155, 1002));
        backend.add_device(device.clone());
        backend.grant(device.identity);
        (backend, device)
    }

    #[test]
    fn test_write_discovers_first_bulk_out_once() {
        let (backend, device) = setup();
        let mut channel = Channel::new(backend.clone(), device.clone());

        assert_eq!(channel.write(&[1, 2, 3]), WriteOutcome::Sent(3));
        assert_eq!(channel.write(&[4]), WriteOutcome::Sent(1));

        assert_eq!(
            channel.route(),
            Some(BulkRoute {
                interface: 0,
                endpoint: 0x02
            })
        );
        assert_eq!(backend.claim_count(device.identity), 1);
        assert_eq!(backend.open_count(device.identity), 1);
        assert_eq!(backend.writes(device.identity), vec![vec![1, 2, 3], vec![4]]);
    }

    #[test]
    fn test_write_dropped_without_bulk_out() {
        let (backend, mut device) = setup();
        device.interfaces = vec![InterfaceInfo {
            number: 0,
            class_code: 7,
            endpoints: vec![EndpointInfo::new(0x81, TransferType::Bulk)],
        }];
        let mut channel = Channel::new(backend.clone(), device.clone());

        assert_eq!(
            channel.write(&[1]),
            WriteOutcome::Dropped(DropReason::NoBulkOutEndpoint)
        );
        assert!(backend.writes(device.identity).is_empty());
        assert_eq!(backend.claim_count(device.identity), 0);
    }

    #[test]
    fn test_write_dropped_without_interface() {
        let (backend, mut device) = setup();
        device.interfaces.clear();
        let mut channel = Channel::new(backend, device);

        assert_eq!(channel.write(&[1]), WriteOutcome::Dropped(DropReason::NoInterface));
    }

    #[test]
    fn test_claim_failure_is_retried_on_next_write() {
        let (backend, device) = setup();
        backend.fail_claim(device.identity, true);
        let mut channel = Channel::new(backend.clone(), device.clone());

        assert_eq!(channel.write(&[1]), WriteOutcome::Dropped(DropReason::ClaimFailed));
        assert_eq!(channel.route(), None);

        backend.fail_claim(device.identity, false);
        assert_eq!(channel.write(&[2]), WriteOutcome::Sent(1));
        assert_eq!(backend.claim_count(device.identity), 2);
        assert_eq!(backend.writes(device.identity), vec![vec![2]]);
    }

    #[test]
    fn test_open_failure_drops_write() {
        let (backend, device) = setup();
        backend.fail_open(device.identity, true);
        let mut channel = Channel::new(backend, device);

        assert_eq!(channel.write(&[1]), WriteOutcome::Dropped(DropReason::OpenFailed));
        assert!(!channel.is_open());
    }

    #[test]
    fn test_control_read_returns_response() {
        let (backend, device) = setup();
        backend.set_status(device.identity, MockStatus::Response(vec![0x38, 0x00]));
        let mut channel = Channel::new(backend, device);

        assert_eq!(channel.control_read(0xA1, 1, 0, 0, 2), vec![0x38, 0x00]);
        assert!(channel.is_open());
    }

    #[test]
    fn test_control_read_failure_closes_and_zero_fills() {
        let (backend, device) = setup();
        backend.set_status(device.identity, MockStatus::Fail);
        let mut channel = Channel::new(backend.clone(), device.clone());
        channel.write(&[1]);
        assert!(channel.route().is_some());

        assert_eq!(channel.control_read(0xA1, 1, 0, 0, 2), vec![0, 0]);
        assert!(!channel.is_open());
        assert_eq!(channel.route(), None);
    }

    #[test]
    fn test_transfers_wait_indefinitely() {
        let (backend, device) = setup();
        let mut channel = Channel::new(backend.clone(), device);

        channel.write(&[1]);
        channel.control_read(0xA1, 1, 0, 0, 2);

        assert_eq!(
            backend.transfer_timeouts(),
            vec![
                (TransferType::Bulk, Duration::ZERO),
                (TransferType::Control, Duration::ZERO)
            ]
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let (backend, device) = setup();
        let mut channel = Channel::new(backend, device);
        channel.write(&[1]);

        channel.close();
        channel.close();
        assert!(!channel.is_open());
        assert_eq!(channel.route(), None);
    }
}
