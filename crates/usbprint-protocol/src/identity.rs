//! 设备标识
//!
//! 打印机名称由厂商 ID 和设备编号组成：`<vendorId>_<deviceId>`（十进制）。
//! 设备编号在一次物理插入期间保持不变，重新插拔后可能变化。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 设备标识（厂商 ID + 设备编号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub device_id: u32,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u16, device_id: u32) -> Self {
        Self {
            vendor_id,
            device_id,
        }
    }

    /// 由总线号和地址计算设备编号（`bus * 1000 + address`）
    pub fn device_id_from_bus(bus_number: u8, address: u8) -> u32 {
        bus_number as u32 * 1000 + address as u32
    }

    /// 对外使用的打印机名称
    pub fn printer_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.vendor_id, self.device_id)
    }
}

impl FromStr for DeviceIdentity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidPrinterName(s.to_string());

        let mut parts = s.split('_');
        let (Some(vendor), Some(device), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let vendor_id = vendor.parse::<u16>().map_err(|_| invalid())?;
        let device_id = device.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(vendor_id, device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_printer_name_format() {
        let id = DeviceIdentity::new(1155, 1002);
        assert_eq!(id.printer_name(), "1155_1002");
    }

    #[test]
    fn test_parse_valid() {
        let id: DeviceIdentity = "1659_3004".parse().unwrap();
        assert_eq!(id, DeviceIdentity::new(1659, 3004));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for name in ["", "1659", "1659_", "_3004", "1659_3004_1", "abc_12", "1659-3004", "70000_1"] {
            assert!(
                name.parse::<DeviceIdentity>().is_err(),
                "expected {:?} to be rejected",
                name
            );
        }
    }

    #[test]
    fn test_device_id_from_bus() {
        assert_eq!(DeviceIdentity::device_id_from_bus(1, 2), 1002);
        assert_eq!(DeviceIdentity::device_id_from_bus(3, 127), 3127);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_fields() {
        let json = serde_json::to_string(&DeviceIdentity::new(1, 2)).unwrap();
        assert_eq!(json, r#"{"vendor_id":1,"device_id":2}"#);
    }

    proptest! {
        #[test]
        fn prop_name_parses_back(vendor in any::<u16>(), device in any::<u32>()) {
            let id = DeviceIdentity::new(vendor, device);
            prop_assert_eq!(id.printer_name().parse::<DeviceIdentity>().unwrap(), id);
        }
    }
}
