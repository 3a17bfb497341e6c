//! Outcome of a flashing run

use std::fmt;
use std::time::Duration;

use pflash_core::error::Error;
use pflash_plo::HandshakeResult;

/// A partition that made it into flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    pub name: String,
    pub device: String,
    pub offset: u64,
    /// Bytes copied (the image length)
    pub size: u64,
    /// Time plo took for the copy
    pub copy_time: Duration,
}

impl fmt::Display for CompletedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes to {}@0x{:x}, copied in {:.2?})",
            self.name, self.size, self.device, self.offset, self.copy_time
        )
    }
}

/// Successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    /// How the target reached the bootloader
    pub handshake: HandshakeResult,
    /// Jobs in the order they were flashed
    pub completed: Vec<CompletedJob>,
    /// Whether the run was a dry run
    pub dry_run: bool,
}

/// Failed run
///
/// The run stops at the first error; `completed` lists what was already in
/// flash by then.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct FlashFailure {
    #[source]
    pub error: Error,
    /// Jobs flashed before the failure
    pub completed: Vec<CompletedJob>,
    /// Job that was running when the failure occurred
    pub failed_job: Option<String>,
}

impl FlashFailure {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }
}

impl From<Error> for FlashFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            completed: Vec::new(),
            failed_job: None,
        }
    }
}
