//! Serial console abstraction
//!
//! The bootloader console is reached through a [`ConsolePort`], which opens
//! a fresh [`Transport`] for every operation. Dropping the transport closes
//! the connection; some targets reset the line between phases, so nothing
//! keeps it open across operations.

use std::time::Duration;

use crate::error::Result;

/// Byte-level access to an open console connection
pub trait Transport {
    /// Write all bytes to the console
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read with timeout
    ///
    /// Reads up to `buf.len()` bytes, waiting at most `timeout`.
    /// Returns the number of bytes read, or 0 if nothing arrived.
    fn read_nonblock(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard anything received but not yet read
    fn clear_input(&mut self) -> Result<()>;

    /// Flush any buffered output
    fn flush(&mut self) -> Result<()>;
}

/// A console device that can be opened on demand
pub trait ConsolePort {
    type Transport: Transport;

    /// Device name, for logs and errors (e.g. `/dev/ttyUSB0`)
    fn name(&self) -> &str;

    /// Open a new connection at `baudrate`
    fn open(&self, baudrate: u32) -> Result<Self::Transport>;
}

impl<P: ConsolePort + ?Sized> ConsolePort for &P {
    type Transport = P::Transport;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&self, baudrate: u32) -> Result<Self::Transport> {
        (**self).open(baudrate)
    }
}
