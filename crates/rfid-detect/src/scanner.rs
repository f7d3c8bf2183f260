//! Serial port scanner
//!
//! This module lists the communication ports a reader or the downstream
//! microcontroller could be attached to.

use serde::{Deserialize, Serialize};
use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::error::DetectError;

/// A communication port found during one enumeration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Port name (e.g., /dev/ttyACM0, COM4)
    pub name: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl PortDescriptor {
    /// Describe a port by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self::named(name),
        }
    }

    /// Port name with product description, for logs
    pub fn label(&self) -> String {
        match &self.product {
            Some(product) => format!("{} ({})", self.name, product),
            None => self.name.clone(),
        }
    }
}

/// Source of candidate ports
pub trait PortEnumerator {
    /// List the ports currently available, in a stable order
    fn enumerate_ports(&self) -> Result<Vec<PortDescriptor>, DetectError>;
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Skip ports matching these patterns
    pub skip_patterns: Vec<String>,
}

/// Serial port scanner over the operating system's port list
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    // Bluetooth ports on macOS
                    "Bluetooth".to_string(),
                    // Debug/logging ports
                    "debug".to_string(),
                ],
            },
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &PortDescriptor) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.name.contains(pattern.as_str()))
    }
}

impl PortEnumerator for PortScanner {
    fn enumerate_ports(&self) -> Result<Vec<PortDescriptor>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| PortDescriptor::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                info!("  {}", port.label());
            }
        }

        Ok(result)
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed port list, for configured deployments and tests
#[derive(Debug, Clone, Default)]
pub struct FixedPorts(pub Vec<PortDescriptor>);

impl FixedPorts {
    /// Build from port names in order
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self(names.into_iter().map(PortDescriptor::named).collect())
    }
}

impl PortEnumerator for FixedPorts {
    fn enumerate_ports(&self) -> Result<Vec<PortDescriptor>, DetectError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_port_descriptor_from_usb() {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x2008,
            pid: 0x2001,
            serial_number: Some("M6E-4471".to_string()),
            manufacturer: Some("ThingMagic".to_string()),
            product: Some("Mercury6e".to_string()),
        });

        let info = PortDescriptor::from_serialport("/dev/ttyACM0".to_string(), &usb_info);

        assert_eq!(info.vid, Some(0x2008));
        assert_eq!(info.pid, Some(0x2001));
        assert_eq!(info.label(), "/dev/ttyACM0 (Mercury6e)");
    }

    #[test]
    fn test_skip_patterns() {
        let scanner = PortScanner::new();
        assert!(scanner.should_skip_port(&PortDescriptor::named(
            "/dev/cu.Bluetooth-Incoming-Port"
        )));
        assert!(!scanner.should_skip_port(&PortDescriptor::named("/dev/ttyACM0")));
    }

    #[test]
    fn test_fixed_ports_keep_order() {
        let ports = FixedPorts::from_names(["COM_A", "COM_B"]).enumerate_ports().unwrap();
        let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["COM_A", "COM_B"]);
    }
}
