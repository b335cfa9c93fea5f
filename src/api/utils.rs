use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Character framing of a serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialFraming {
    pub data_bits: u8,
    pub parity: char,
    pub stop_bits: u8,
}

impl Default for SerialFraming {
    fn default() -> Self {
        Self {
            data_bits: 8,
            parity: 'N',
            stop_bits: 1,
        }
    }
}

impl SerialFraming {
    pub fn data_bits(&self) -> Result<serialport::DataBits> {
        match self.data_bits {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            other => Err(anyhow!("Unsupported data bits: {other}")),
        }
    }

    pub fn parity(&self) -> Result<serialport::Parity> {
        match self.parity.to_ascii_uppercase() {
            'N' => Ok(serialport::Parity::None),
            'E' => Ok(serialport::Parity::Even),
            'O' => Ok(serialport::Parity::Odd),
            other => Err(anyhow!("Unsupported parity: {other}")),
        }
    }

    pub fn stop_bits(&self) -> Result<serialport::StopBits> {
        match self.stop_bits {
            1 => Ok(serialport::StopBits::One),
            2 => Ok(serialport::StopBits::Two),
            other => Err(anyhow!("Unsupported stop bits: {other}")),
        }
    }
}

impl std::fmt::Display for SerialFraming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.data_bits,
            self.parity.to_ascii_uppercase(),
            self.stop_bits
        )
    }
}

/// Open a serial port with the requested framing and timeout, enabling exclusive access on Unix systems.
pub fn open_serial_port(
    port: &str,
    baud_rate: u32,
    framing: SerialFraming,
    timeout: Duration,
) -> Result<Box<dyn serialport::SerialPort>> {
    let builder = serialport::new(port, baud_rate)
        .data_bits(framing.data_bits()?)
        .parity(framing.parity()?)
        .stop_bits(framing.stop_bits()?)
        .timeout(timeout);

    #[cfg(unix)]
    {
        let mut handle = builder
            .open_native()
            .map_err(|err| anyhow!("Failed to open port {port}: {err}"))?;
        handle
            .set_exclusive(true)
            .map_err(|err| anyhow!("Failed to acquire exclusive access to {port}: {err}"))?;
        Ok(Box::new(handle))
    }

    #[cfg(not(unix))]
    {
        builder
            .open()
            .map_err(|err| anyhow!("Failed to open port {port}: {err}"))
    }
}

/// Names of the serial ports the system reports.
pub fn available_ports() -> Result<Vec<String>> {
    Ok(serialport::available_ports()
        .map_err(|err| anyhow!("Failed to enumerate serial ports: {err}"))?
        .into_iter()
        .map(|info| info.port_name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_conversion() {
        let framing = SerialFraming {
            data_bits: 7,
            parity: 'e',
            stop_bits: 2,
        };
        assert_eq!(framing.data_bits().unwrap(), serialport::DataBits::Seven);
        assert_eq!(framing.parity().unwrap(), serialport::Parity::Even);
        assert_eq!(framing.stop_bits().unwrap(), serialport::StopBits::Two);
        assert_eq!(framing.to_string(), "7E2");
        assert_eq!(SerialFraming::default().to_string(), "8N1");
    }

    #[test]
    fn test_framing_rejects_unknown_values() {
        let framing = SerialFraming {
            data_bits: 9,
            parity: 'M',
            stop_bits: 3,
        };
        assert!(framing.data_bits().is_err());
        assert!(framing.parity().is_err());
        assert!(framing.stop_bits().is_err());
    }
}
