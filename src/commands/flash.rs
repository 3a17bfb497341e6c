//! flash-via-ramdisk command implementation

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use pflash_core::{ConfigStore, FlashJob};
use pflash_flash::{
    flash_via_ramdisk, CompletedJob, FlashFailure, FlashProgress, FlashReport, FlashRequest,
};
use pflash_openocd::OpenOcd;
use pflash_plo::{HandshakeResult, SerialConsole};

/// Progress reporter using indicatif spinners
struct IndicatifProgress {
    current: Option<ProgressBar>,
    total: usize,
}

impl IndicatifProgress {
    fn new() -> Self {
        Self {
            current: None,
            total: 0,
        }
    }

    fn spinner(&mut self, message: String) {
        self.finish_current();
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current = Some(pb);
    }

    fn finish(&mut self, message: String) {
        if let Some(pb) = self.current.take() {
            pb.finish_with_message(message);
        }
    }

    fn finish_current(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

impl FlashProgress for IndicatifProgress {
    fn planned(&mut self, jobs: &[FlashJob]) {
        self.total = jobs.len();
    }

    fn handshake_started(&mut self, port: &str) {
        self.spinner(format!("Waiting for plo on {}...", port));
    }

    fn handshake_done(&mut self, result: HandshakeResult) {
        self.finish(match result {
            HandshakeResult::AlreadyInBootloader => "Target in plo".to_string(),
            HandshakeResult::RebootedIntoBootloader => "Target rebooted into plo".to_string(),
        });
    }

    fn uploading(&mut self, job: &FlashJob, size: u64) {
        self.spinner(format!(
            "Uploading {} ({}) to RAM...",
            job.name(),
            super::format_size(size)
        ));
    }

    fn copying(&mut self, job: &FlashJob, _command: &str) {
        self.spinner(format!(
            "Copying {} to {}@{:#x}...",
            job.name(),
            job.device(),
            job.offset()
        ));
    }

    fn job_finished(&mut self, job: &CompletedJob) {
        self.finish(format!("Flashed {}", job));
    }

    fn complete(&mut self, total: Duration) {
        self.finish_current();
        log::info!("Flashed {} partition(s) in {:.2?}", self.total, total);
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        self.finish_current();
    }
}

/// Flash `request.partitions` through the RAM disk
pub fn run_flash(request: &FlashRequest, console: &str) -> Result<FlashReport, FlashFailure> {
    let configs = ConfigStore::with_default_sources();
    let mut progress = IndicatifProgress::new();

    let result = flash_via_ramdisk(
        request,
        &configs,
        SerialConsole::new(console),
        OpenOcd::new(),
        &mut progress,
    );
    drop(progress);

    match &result {
        Ok(report) => {
            for job in &report.completed {
                log::debug!("Completed {}", job);
            }
            if report.dry_run {
                println!("Dry run complete, nothing was written");
            } else {
                println!("Flashed {} partition(s)", report.completed.len());
            }
        }
        Err(failure) => {
            for job in &failure.completed {
                eprintln!("Completed: {}", job);
            }
            if let Some(name) = &failure.failed_job {
                eprintln!("Failed:    {}", name);
            }
        }
    }
    result
}
