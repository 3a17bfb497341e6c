//! Error types for pflash
//!
//! Every failure a flashing run can hit is one variant of [`Error`]. None of
//! them is retried: the orchestrator stops at the first one and the binary
//! turns it into a process exit code via [`Error::exit_code`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// pflash error taxonomy
#[derive(Debug, Error)]
pub enum Error {
    // Environment
    /// A host tool pflash depends on is not available
    #[error("Prerequisite not fulfilled: {0}")]
    PrerequisiteMissing(String),

    // Configuration
    /// No configuration entry matches the requested project/board
    #[error("Configuration not found: {0}")]
    ConfigNotFound(String),

    /// A configuration source could not be parsed
    #[error("Invalid configuration in {source_name}: {reason}")]
    ConfigInvalid { source_name: String, reason: String },

    // Planning
    /// The board memory-layout descriptor does not exist
    #[error("Partition descriptor not found: {}", .0.display())]
    DescriptorNotFound(PathBuf),

    /// The board memory-layout descriptor is malformed or inconsistent
    #[error("Invalid partition descriptor {}: {reason}", path.display())]
    DescriptorInvalid { path: PathBuf, reason: String },

    /// None of the requested partitions exist in the descriptor
    #[error("Nothing to flash: none of [{requested}] found in {}", descriptor.display())]
    EmptyJobSet {
        requested: String,
        descriptor: PathBuf,
    },

    /// The image for a partition has not been built
    #[error("Partition image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    /// The image is bigger than the partition it is meant for
    #[error(
        "Image {} ({size} bytes) does not fit partition '{partition}' ({capacity} bytes)",
        path.display()
    )]
    ImageTooLarge {
        path: PathBuf,
        partition: String,
        size: u64,
        capacity: u64,
    },

    // Bootloader console
    /// Neither the plo prompt nor the system shell answered the wake-up
    #[error(
        "Cannot confirm whether target runs plo or the system after {elapsed:?} (last line: \"{last_line}\")"
    )]
    AmbiguousBootState {
        elapsed: Duration,
        last_line: String,
    },

    /// The target did not come back to plo after a reboot request
    #[error("Target not ready in plo {timeout:?} after '{command}' (last line: \"{last_line}\")")]
    HandshakeTimeout {
        command: String,
        timeout: Duration,
        last_line: String,
    },

    // Debug probe
    /// The probe tool did not finish in time
    #[error("Upload of {} timed out after {timeout:?}", image.display())]
    UploadTimeout {
        image: PathBuf,
        timeout: Duration,
        output: String,
    },

    /// The probe tool exited with an error
    #[error("Upload of {} failed ({status}): {output}", image.display())]
    UploadFailed {
        image: PathBuf,
        status: String,
        output: String,
    },

    // Flash copy
    /// plo did not return to its prompt after a copy command
    #[error("plo did not finish '{command}' within {timeout:?} (last line: \"{last_line}\")")]
    CopyTimeout {
        command: String,
        timeout: Duration,
        last_line: String,
    },

    /// Serial console could not be opened, read or written
    #[error("Serial I/O error on {port}: {reason}")]
    SerialIo { port: String, reason: String },
}

impl Error {
    /// Build a [`Error::SerialIo`] from anything printable
    pub fn serial(port: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::SerialIo {
            port: port.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`Error::DescriptorInvalid`] for `path`
    pub fn descriptor(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::DescriptorInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::PrerequisiteMissing(_) => 2,
            Error::ConfigNotFound(_) | Error::ConfigInvalid { .. } => 3,
            Error::DescriptorNotFound(_)
            | Error::DescriptorInvalid { .. }
            | Error::EmptyJobSet { .. }
            | Error::ImageNotFound(_)
            | Error::ImageTooLarge { .. } => 4,
            Error::AmbiguousBootState { .. } | Error::HandshakeTimeout { .. } => 5,
            Error::UploadTimeout { .. } | Error::UploadFailed { .. } => 6,
            Error::CopyTimeout { .. } => 7,
            Error::SerialIo { .. } => 8,
        }
    }

    /// Whether this error can only come from real hardware
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousBootState { .. }
                | Error::HandshakeTimeout { .. }
                | Error::UploadTimeout { .. }
                | Error::UploadFailed { .. }
                | Error::CopyTimeout { .. }
                | Error::SerialIo { .. }
        )
    }
}

/// Result type alias using the pflash Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_grouped_by_stage() {
        assert_eq!(Error::PrerequisiteMissing("openocd".into()).exit_code(), 2);
        assert_eq!(Error::ConfigNotFound("x".into()).exit_code(), 3);
        assert_eq!(
            Error::EmptyJobSet {
                requested: "kernel".into(),
                descriptor: PathBuf::from("nvm.yaml"),
            }
            .exit_code(),
            4
        );
        assert_eq!(Error::serial("/dev/ttyUSB0", "gone").exit_code(), 8);
    }

    #[test]
    fn test_display_keeps_context() {
        let err = Error::CopyTimeout {
            command: "copy ramdisk 0 16 flash0 0 16".into(),
            timeout: Duration::from_secs(3),
            last_line: "copy ramdisk 0 16 flash0 0 16".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("copy ramdisk 0 16 flash0 0 16"));
        assert!(msg.contains("3s"));
        assert!(err.is_hardware());
        assert!(!Error::ImageNotFound(PathBuf::from("a.img")).is_hardware());
    }
}
