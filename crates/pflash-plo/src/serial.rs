//! Serial port console implementation

use std::io::{Read, Write};
use std::time::Duration;

use pflash_core::error::{Error, Result};
use pflash_core::{ConsolePort, Transport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Default timeout for blocking writes
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open serial connection to the target console
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    device: String,
}

impl SerialTransport {
    /// Open a serial port with the specified baud rate (8N1, no flow control)
    pub fn open(device: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(device, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|e| Error::serial(device, e))?;

        log::debug!("Opened serial port {} at {} baud", device, baud);

        Ok(Self {
            port,
            device: device.to_string(),
        })
    }

    fn io_error(&self, e: impl std::fmt::Display) -> Error {
        Error::serial(&self.device, e)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data).map_err(|e| self.io_error(e))
    }

    fn read_nonblock(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        // Set temporary timeout
        let old_timeout = self.port.timeout();
        self.port
            .set_timeout(timeout)
            .map_err(|e| self.io_error(e))?;

        let result = match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(self.io_error(e)),
        };

        // Restore timeout
        self.port
            .set_timeout(old_timeout)
            .map_err(|e| self.io_error(e))?;
        result
    }

    fn clear_input(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| self.io_error(e))
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush().map_err(|e| self.io_error(e))
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        log::trace!("Closed serial port {}", self.device);
    }
}

/// A serial device path, opened anew for every console operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConsole {
    device: String,
}

impl SerialConsole {
    /// Console on `device` (e.g. `/dev/ttyUSB0` or `COM3`)
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl ConsolePort for SerialConsole {
    type Transport = SerialTransport;

    fn name(&self) -> &str {
        &self.device
    }

    fn open(&self, baudrate: u32) -> Result<SerialTransport> {
        SerialTransport::open(&self.device, baudrate)
    }
}
