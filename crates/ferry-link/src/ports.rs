//! Serial port enumeration.

use crate::error::{LinkError, Result};
use serialport::{SerialPortInfo, SerialPortType};

/// A serial port the OS reports as present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device identifier to open
    pub device: String,
    /// Short description of the port type or USB product
    pub description: String,
    /// USB manufacturer string, if any
    pub manufacturer: Option<String>,
    /// USB serial number, if any
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Manufacturer and serial number joined as `manufacturer:serial`,
    /// with `unknown` standing in for missing parts.
    #[must_use]
    pub fn identity(&self) -> String {
        format!(
            "{}:{}",
            self.manufacturer.as_deref().unwrap_or("unknown"),
            self.serial_number.as_deref().unwrap_or("unknown")
        )
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                description: usb
                    .product
                    .clone()
                    .unwrap_or_else(|| format!("USB serial {:04x}:{:04x}", usb.vid, usb.pid)),
                manufacturer: usb.manufacturer,
                serial_number: usb.serial_number,
                device: info.port_name,
            },
            SerialPortType::PciPort => Self {
                device: info.port_name,
                description: "PCI serial port".into(),
                manufacturer: None,
                serial_number: None,
            },
            SerialPortType::BluetoothPort => Self {
                device: info.port_name,
                description: "Bluetooth serial port".into(),
                manufacturer: None,
                serial_number: None,
            },
            SerialPortType::Unknown => Self {
                device: info.port_name,
                description: "n/a".into(),
                manufacturer: None,
                serial_number: None,
            },
        }
    }
}

/// List the serial ports currently present, sorted by device name.
///
/// # Errors
///
/// Returns [`LinkError::Enumeration`] if the OS query fails.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .map_err(|e| LinkError::Enumeration(e.to_string()))?
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by(|a, b| a.device.cmp(&b.device));
    tracing::debug!(count = ports.len(), "Enumerated serial ports");
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_port_info() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyS0".into(),
            port_type: SerialPortType::Unknown,
        };
        let port = PortInfo::from(info);
        assert_eq!(port.device, "/dev/ttyS0");
        assert_eq!(port.description, "n/a");
        assert_eq!(port.identity(), "unknown:unknown");
    }

    #[test]
    fn test_pci_port_info() {
        let info = SerialPortInfo {
            port_name: "COM1".into(),
            port_type: SerialPortType::PciPort,
        };
        assert_eq!(PortInfo::from(info).description, "PCI serial port");
    }

    #[test]
    fn test_identity_partial() {
        let port = PortInfo {
            device: "COM8".into(),
            description: "CP2102".into(),
            manufacturer: Some("Silicon Labs".into()),
            serial_number: None,
        };
        assert_eq!(port.identity(), "Silicon Labs:unknown");
    }
}
