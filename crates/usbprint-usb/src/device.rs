//! USB 设备描述快照
//!
//! 枚举时从平台读取一次，之后不再访问描述符。

use usbprint_protocol::{DeviceIdentity, UsbClass};

/// 传输类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// 端点方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device-to-Host
    In,
    /// Host-to-Device
    Out,
}

/// 端点描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub transfer_type: TransferType,
    pub direction: Direction,
}

impl EndpointInfo {
    /// 由端点地址推断方向（bit 7 置位为 IN）
    pub fn new(address: u8, transfer_type: TransferType) -> Self {
        let direction = if address & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        };
        Self {
            address,
            transfer_type,
            direction,
        }
    }

    pub fn is_bulk_out(&self) -> bool {
        self.transfer_type == TransferType::Bulk && self.direction == Direction::Out
    }
}

/// 接口描述（取第一个 alternate setting）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub class_code: u8,
    pub endpoints: Vec<EndpointInfo>,
}

impl InterfaceInfo {
    /// 第一个 Bulk OUT 端点
    pub fn first_bulk_out(&self) -> Option<&EndpointInfo> {
        self.endpoints.iter().find(|ep| ep.is_bulk_out())
    }
}

/// USB 设备
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDevice {
    pub identity: DeviceIdentity,
    pub product_id: u16,
    pub bus_number: u8,
    pub address: u8,
    pub device_class: u8,
    pub interfaces: Vec<InterfaceInfo>,
}

impl UsbDevice {
    pub fn vendor_id(&self) -> u16 {
        self.identity.vendor_id
    }

    pub fn device_id(&self) -> u32 {
        self.identity.device_id
    }

    pub fn printer_name(&self) -> String {
        self.identity.printer_name()
    }

    /// 设备声明的类别码
    ///
    /// 设备级类别为 0（按接口区分）时取第一个接口的类别。
    pub fn class_code(&self) -> u8 {
        if self.device_class == 0 {
            self.interfaces
                .first()
                .map(|iface| iface.class_code)
                .unwrap_or(self.device_class)
        } else {
            self.device_class
        }
    }

    pub fn class(&self) -> UsbClass {
        UsbClass::from(self.class_code())
    }

    /// 是否为打印机类设备
    pub fn is_printer(&self) -> bool {
        UsbClass::from(self.device_class).is_printer()
            || self
                .interfaces
                .first()
                .is_some_and(|iface| UsbClass::from(iface.class_code).is_printer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(device_class: u8, interface_class: u8) -> UsbDevice {
        UsbDevice {
            identity: DeviceIdentity::new(0x0416, 1003),
            product_id: 0x5011,
            bus_number: 1,
            address: 3,
            device_class,
            interfaces: vec![InterfaceInfo {
                number: 0,
                class_code: interface_class,
                endpoints: vec![
                    EndpointInfo::new(0x81, TransferType::Bulk),
                    EndpointInfo::new(0x01, TransferType::Bulk),
                ],
            }],
        }
    }

    #[test]
    fn test_endpoint_direction_from_address() {
        assert_eq!(EndpointInfo::new(0x81, TransferType::Bulk).direction, Direction::In);
        assert_eq!(EndpointInfo::new(0x02, TransferType::Bulk).direction, Direction::Out);
    }

    #[test]
    fn test_first_bulk_out() {
        let dev = device(0, 7);
        assert_eq!(dev.interfaces[0].first_bulk_out().unwrap().address, 0x01);
    }

    #[test]
    fn test_printer_detection() {
        assert!(device(0, 7).is_printer());
        assert!(device(7, 0xFF).is_printer());
        assert!(!device(0, 8).is_printer());
    }

    #[test]
    fn test_class_falls_back_to_interface() {
        assert_eq!(device(0, 7).class(), UsbClass::Printer);
        assert_eq!(device(0xEF, 7).class(), UsbClass::Misc);
        assert_eq!(device(0, 7).class_code(), 7);
    }

    #[test]
    fn test_printer_name() {
        assert_eq!(device(0, 7).printer_name(), "1046_1003");
    }
}
