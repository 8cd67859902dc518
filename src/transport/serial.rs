//! Serial/USB radio link.
//!
//! A LoRa modem attached over USB exchanges radio packets with the host as
//! serial frames (see [`protocol::frame`](crate::protocol::frame)). Packets
//! from the host are sent as-is. Packets from the modem carry a two byte
//! signal prefix:
//! ```text
//! [rssi:i8 dBm] [snr*4:i8] [radio packet...]
//! ```

use std::io::{self, Read, Write};
use std::time::Duration;

use bytes::Bytes;
use tokio_serial::SerialPort;

use crate::error::{Error, RadioError, Result};
use crate::protocol::{FrameDecoder, encode_frame};
use crate::transport::RadioLink;

/// Default baud rate for USB LoRa modems.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout; reads only happen when bytes are waiting.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// SNR scaling factor (raw value is multiplied by 4 on the wire).
const SNR_SCALE: f32 = 4.0;

/// Length of the signal prefix on received frames.
const SIGNAL_PREFIX_LEN: usize = 2;

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Radio link over a USB serial LoRa modem.
pub struct SerialRadio {
    port: Box<dyn SerialPort>,
    decoder: FrameDecoder,
    last_rssi: i16,
    last_snr: Option<f32>,
}

impl SerialRadio {
    /// Opens the serial port described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        tracing::info!("opening serial radio: {}", config.port);

        let port = tokio_serial::new(&config.port, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .map_err(Error::Serial)?;

        // Stale bytes from before the port was opened would desync framing.
        if let Err(e) = port.clear(tokio_serial::ClearBuffer::Input) {
            tracing::warn!("failed to clear serial input buffer: {}", e);
        }

        Ok(Self::from_port(port))
    }

    /// Wraps an already opened port.
    #[must_use]
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            decoder: FrameDecoder::new(),
            last_rssi: 0,
            last_snr: None,
        }
    }

    /// Reads whatever the port has buffered into the frame decoder.
    fn fill(&mut self) -> io::Result<()> {
        let waiting = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if waiting == 0 {
            return Ok(());
        }

        let mut buf = vec![0u8; waiting];
        let n = match self.port.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(e),
        };
        tracing::trace!("received {} bytes", n);
        self.decoder.feed(&buf[..n]);
        Ok(())
    }

    /// Splits the signal prefix off a received frame.
    fn strip_signal(&mut self, frame: &Bytes) -> Option<Bytes> {
        if frame.len() < SIGNAL_PREFIX_LEN {
            tracing::warn!("serial frame too short for signal prefix: {} bytes", frame.len());
            return None;
        }

        self.last_rssi = i16::from(i8::from_le_bytes([frame[0]]));
        self.last_snr = Some(f32::from(i8::from_le_bytes([frame[1]])) / SNR_SCALE);
        Some(frame.slice(SIGNAL_PREFIX_LEN..))
    }
}

impl RadioLink for SerialRadio {
    fn transmit(&mut self, packet: &[u8]) -> std::result::Result<(), RadioError> {
        let frame = encode_frame(packet).map_err(|_| RadioError::PacketTooLarge {
            size: packet.len(),
            max: crate::protocol::MAX_FRAME_LEN,
        })?;
        tracing::trace!("sending frame: {} bytes", frame.len());

        self.port
            .write_all(&frame)
            .and_then(|()| self.port.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected => RadioError::Closed,
                _ => RadioError::Io(e),
            })
    }

    fn poll_receive(&mut self) -> Option<Bytes> {
        if let Err(e) = self.fill() {
            tracing::warn!("serial read error: {}", e);
        }

        loop {
            match self.decoder.decode() {
                Ok(Some(frame)) => {
                    if let Some(packet) = self.strip_signal(&frame) {
                        return Some(packet);
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!("frame decode error: {}", e);
                }
            }
        }
    }

    fn read_rssi(&self) -> i16 {
        self.last_rssi
    }

    fn read_snr(&self) -> Option<f32> {
        self.last_snr
    }
}

/// Lists available serial ports.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyACM0")
            .baud_rate(9600)
            .read_timeout(Duration::from_millis(50));
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout, Duration::from_millis(50));
    }

    #[test]
    #[ignore = "Requires /sys/class/tty - not available in sandboxed builds"]
    fn test_list_ports() {
        let _ = list_ports();
    }
}
