//! USB 设备类别表
//!
//! 用于设备列表展示和打印机类别过滤。

/// USB 基础类别码（bDeviceClass / bInterfaceClass）
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum UsbClass {
    PerInterface = 0x00,
    Audio = 0x01,
    Comm = 0x02,
    Hid = 0x03,
    Physical = 0x05,
    StillImage = 0x06,
    Printer = 0x07,
    MassStorage = 0x08,
    Hub = 0x09,
    CdcData = 0x0A,
    SmartCard = 0x0B,
    ContentSecurity = 0x0D,
    Video = 0x0E,
    WirelessController = 0xE0,
    Misc = 0xEF,
    ApplicationSpecific = 0xFE,
    /// 其余类别码，0xFF 为厂商自定义
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl UsbClass {
    pub fn is_printer(self) -> bool {
        self == UsbClass::Printer
    }

    /// 类别描述
    pub fn description(self) -> &'static str {
        match self {
            UsbClass::PerInterface => {
                "USB class indicating that the class is determined on a per-interface basis"
            },
            UsbClass::Audio => "USB class for audio devices",
            UsbClass::Comm => "USB class for communication devices",
            UsbClass::Hid => "USB class for human interface devices (for example, mice and keyboards)",
            UsbClass::Physical => "USB class for physical devices",
            UsbClass::StillImage => "USB class for still image devices (digital cameras)",
            UsbClass::Printer => "USB class for printers",
            UsbClass::MassStorage => "USB class for mass storage devices",
            UsbClass::Hub => "USB class for USB hubs",
            UsbClass::CdcData => "USB class for CDC devices (communications device class)",
            UsbClass::SmartCard => "USB class for content smart card devices",
            UsbClass::ContentSecurity => "USB class for content security devices",
            UsbClass::Video => "USB class for video devices",
            UsbClass::WirelessController => "USB class for wireless controller devices",
            UsbClass::Misc => "USB class for miscellaneous devices",
            UsbClass::ApplicationSpecific => "Application specific USB class",
            UsbClass::Unknown(0xFF) => "Vendor specific USB class",
            UsbClass::Unknown(_) => "Unknown USB class!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printer_class() {
        assert_eq!(UsbClass::from(0x07), UsbClass::Printer);
        assert!(UsbClass::from(0x07).is_printer());
        assert!(!UsbClass::from(0x08).is_printer());
    }

    #[test]
    fn test_unknown_class_is_kept() {
        assert_eq!(UsbClass::from(0x42), UsbClass::Unknown(0x42));
        assert_eq!(UsbClass::from(0x42).description(), "Unknown USB class!");
    }

    #[test]
    fn test_description() {
        assert_eq!(UsbClass::Printer.description(), "USB class for printers");
        assert_eq!(UsbClass::Hub.description(), "USB class for USB hubs");
        assert_eq!(UsbClass::Misc.description(), "USB class for miscellaneous devices");
    }

    #[test]
    fn test_vendor_specific_class() {
        assert_eq!(UsbClass::from(0xFF), UsbClass::Unknown(0xFF));
        assert_eq!(UsbClass::from(0xFF).description(), "Vendor specific USB class");
        assert_eq!(UsbClass::from(0xFE), UsbClass::ApplicationSpecific);
    }
}
