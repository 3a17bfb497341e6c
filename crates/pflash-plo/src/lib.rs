//! pflash-plo - Phoenix-RTOS plo bootloader console driver
//!
//! plo exposes an interactive ASCII console over a serial line. This crate
//! speaks to it:
//!
//! - [`handshake`] forces the target into the plo console, rebooting it out
//!   of the system shell when needed
//! - [`copy`] asks plo to copy a RAM disk image into flash and waits for it
//! - [`serial`] opens the console on a real serial port
//!
//! # Wire protocol
//!
//! Plain ASCII, newline-terminated commands. plo's prompt is `(plo)% `, the
//! system shell's prompt contains `psh`, and after a reboot plo counts down
//! with `Waiting for input` before booting on.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pflash_plo::{copy_from_ramdisk, enter_bootloader, CopyCommand, HandshakeParams, SerialConsole};
//!
//! let console = SerialConsole::new("/dev/ttyUSB0");
//! let params = HandshakeParams {
//!     baudrate: 115200,
//!     handshake_timeout: Duration::from_secs(2),
//!     reboot_timeout: Duration::from_secs(10),
//! };
//! enter_bootloader(&console, params, false)?;
//!
//! let cmd = CopyCommand { size: 0x20000, alias: "flash0".into(), offset: 0 };
//! let took = copy_from_ramdisk(&console, 115200, &cmd, Duration::from_secs(60), false)?;
//! println!("copied in {:?}", took);
//! # Ok::<(), pflash_core::Error>(())
//! ```

pub mod console;
pub mod copy;
pub mod handshake;
pub mod serial;

/// plo console prompt
pub const PLO_PROMPT: &str = "(plo)%";
/// Substring identifying the system shell prompt
pub const SHELL_TOKEN: &str = "psh";
/// Printed by plo after a reset while it waits for a key
pub const READY_TOKEN: &str = "Waiting for input";
/// System shell command that resets the target
pub const REBOOT_COMMAND: &str = "reboot";

// Re-exports
pub use console::{Console, Line};
pub use copy::{copy_from_ramdisk, CopyCommand};
pub use handshake::{
    enter_bootloader, BootloaderHandshake, HandshakeParams, HandshakeResult, HandshakeState,
};
pub use serial::{SerialConsole, SerialTransport};
