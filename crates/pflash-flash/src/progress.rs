//! Progress reporting for a flashing run

use std::time::Duration;

use pflash_core::FlashJob;
use pflash_plo::HandshakeResult;

use crate::report::CompletedJob;

/// Callbacks for run progress
///
/// Every method has an empty default so sinks only implement what they show.
pub trait FlashProgress {
    /// Called once the plan is known, before any hardware is touched
    fn planned(&mut self, _jobs: &[FlashJob]) {}

    /// Called before the bootloader handshake
    fn handshake_started(&mut self, _port: &str) {}

    /// Called when the target is in the bootloader
    fn handshake_done(&mut self, _result: HandshakeResult) {}

    /// Called when a job starts; `index` is 0-based
    fn job_started(&mut self, _index: usize, _total: usize, _job: &FlashJob) {}

    /// Called before the image is staged in RAM
    fn uploading(&mut self, _job: &FlashJob, _size: u64) {}

    /// Called before plo is told to copy the staged image
    fn copying(&mut self, _job: &FlashJob, _command: &str) {}

    /// Called when a job has been copied into flash
    fn job_finished(&mut self, _job: &CompletedJob) {}

    /// Called once after the last job
    fn complete(&mut self, _total: Duration) {}
}

/// A no-op progress reporter
pub struct NoProgress;

impl FlashProgress for NoProgress {}
