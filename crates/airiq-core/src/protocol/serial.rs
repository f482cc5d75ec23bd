//! Serial port handling
//!
//! Opens and configures the UART link to a sensor.

use serde::{Deserialize, Serialize};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use super::{ByteSource, SensorError, SerialChannel, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// Settings for one sensor link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorLinkConfig {
    /// Serial port name (e.g. "/dev/ttyS0" or "COM3")
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay after opening the port before the sensor output is trusted
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_settle_delay_ms() -> u64 {
    2000
}

impl SensorLinkConfig {
    /// Link on `port` with default settings
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            settle_delay_ms: default_settle_delay_ms(),
        }
    }

    /// Override the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Per-read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Pause after opening before the first read
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                (Some(usb_info.vid), Some(usb_info.pid), usb_info.product)
            }
            _ => (None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

/// Sort key putting the on-board UARTs a Raspberry Pi wires sensors to
/// (ttyS*, ttyAMA*) first, then USB adapters, then everything else.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in ["ttyS", "ttyAMA", "ttyUSB", "ttyACM"].iter().enumerate() {
        if let Some(rest) = basename.strip_prefix(prefix) {
            if let Ok(num) = rest.parse::<usize>() {
                return (rank as u8, num, basename.to_string());
            }
        }
    }
    (4, 0, basename.to_string())
}

/// List candidate serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Linux-only: the serial0 alias and USB adapters are not always reported
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname == "serial0" || fname.starts_with("ttyAMA") || fname.starts_with("ttyUSB")
                {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo {
                        name: full,
                        vid: None,
                        pid: None,
                        product: None,
                    });
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Open and configure the serial link described by `config`.
///
/// Waits out the settle delay and drops whatever the sensor sent meanwhile,
/// so the first read starts from live data.
pub fn open_port(config: &SensorLinkConfig) -> Result<SerialChannel, SensorError> {
    let mut port = serialport::new(&config.port, config.baud_rate)
        .timeout(config.read_timeout())
        .open()
        .map_err(|e| SensorError::ConnectionFailed(format!("{}: {}", config.port, e)))?;
    configure_port(port.as_mut())?;

    tracing::info!(
        port = %config.port,
        baud = config.baud_rate,
        settle_ms = config.settle_delay_ms,
        "opened sensor link"
    );
    std::thread::sleep(config.settle_delay());

    let mut channel = SerialChannel::new(port, config.baud_rate);
    channel.clear_input()?;
    Ok(channel)
}

/// Configure a serial port for 8N1 without flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), SensorError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| SensorError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| SensorError::SerialError(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| SensorError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| SensorError::SerialError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // This test just ensures the function doesn't panic
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyAMA0",
            "/dev/ttyUSB0",
            "/dev/ttyS0",
            "/dev/serial0",
            "/dev/ttyACM0",
        ];
        let mut ports: Vec<PortInfo> = names
            .into_iter()
            .map(|n| PortInfo {
                name: n.to_string(),
                vid: None,
                pid: None,
                product: None,
            })
            .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyS0",
                "/dev/ttyAMA0",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/ttyACM0",
                "/dev/serial0",
            ]
        );
    }

    #[test]
    fn test_link_config_defaults_from_json() {
        let config: SensorLinkConfig = serde_json::from_str(r#"{"port": "/dev/ttyS0"}"#).unwrap();
        assert_eq!(config, SensorLinkConfig::new("/dev/ttyS0"));
        assert_eq!(config.read_timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn test_open_missing_port_is_connection_error() {
        let config = SensorLinkConfig::new("/dev/airiq-does-not-exist");
        let err = open_port(&config).err().expect("port should not open");
        assert!(matches!(err, SensorError::ConnectionFailed(_)));
    }
}
