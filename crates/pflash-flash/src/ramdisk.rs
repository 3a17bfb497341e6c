//! Flashing through the plo RAM disk
//!
//! A run goes through these steps and stops at the first error:
//!
//! 1. Check the upload tool is usable on this host
//! 2. Look up the board configuration
//! 3. Plan the jobs and check every image before hardware is touched
//! 4. Bring the target into plo, once for the whole batch
//! 5. For every job, in offset order: stage the image in RAM, then have plo
//!    copy it into flash
//!
//! No step is retried.

use std::path::PathBuf;
use std::time::Instant;

use pflash_core::error::Error;
use pflash_core::{
    BoardConfig, ConfigStore, ConsolePort, FlashJob, ImageUploader, PartitionPlanner,
    ProjectPaths, UploadRequest,
};
use pflash_plo::{copy_from_ramdisk, enter_bootloader, CopyCommand, HandshakeParams};

use crate::progress::FlashProgress;
use crate::report::{CompletedJob, FlashFailure, FlashReport};

/// What to flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashRequest {
    /// phoenix-rtos-project project name
    pub project: String,
    /// Board name, when a project has several boards
    pub board: Option<String>,
    /// phoenix-rtos-project checkout root
    pub root: PathBuf,
    /// Partition names to flash
    pub partitions: Vec<String>,
    pub dry_run: bool,
}

/// Plan the jobs and size every image against its partition
fn plan_jobs(
    request: &FlashRequest,
    config: &BoardConfig,
) -> Result<Vec<(FlashJob, u64)>, Error> {
    let planner = PartitionPlanner::new(ProjectPaths::new(&request.root, &config.project));
    let jobs = planner.plan_nonempty(&request.partitions)?;
    jobs.into_iter()
        .map(|job| -> Result<(FlashJob, u64), Error> {
            let len = job.image_len()?;
            log::debug!(
                "Job {}: {} ({} bytes) -> {}@0x{:x}, partition size 0x{:x}",
                job.name(),
                job.image().display(),
                len,
                job.device(),
                job.offset(),
                job.capacity()
            );
            Ok((job, len))
        })
        .collect()
}

/// Flash the requested partitions through the RAM disk
///
/// `port` is the target console and `uploader` the tool staging images in
/// target RAM. With `request.dry_run` set, prerequisite, configuration and
/// planning errors still surface but nothing is opened, written or invoked.
pub fn flash_via_ramdisk<P, U>(
    request: &FlashRequest,
    configs: &ConfigStore,
    port: P,
    uploader: U,
    progress: &mut dyn FlashProgress,
) -> Result<FlashReport, FlashFailure>
where
    P: ConsolePort,
    U: ImageUploader,
{
    let start = Instant::now();
    let dry_run = request.dry_run;

    uploader.check_available()?;

    let config = configs.find(&request.project, request.board.as_deref())?;
    log::info!(
        "Using board '{}' (project {}), console {} at {} baud",
        config.name,
        config.project,
        port.name(),
        config.console.baudrate
    );

    let jobs = plan_jobs(request, &config)?;
    let planned: Vec<FlashJob> = jobs.iter().map(|(job, _)| job.clone()).collect();
    progress.planned(&planned);

    progress.handshake_started(port.name());
    let handshake = enter_bootloader(&port, HandshakeParams::from(&config.console), dry_run)?;
    log::info!("Target in bootloader ({:?})", handshake);
    progress.handshake_done(handshake);

    let total = jobs.len();
    let mut completed = Vec::with_capacity(total);
    for (index, (job, len)) in jobs.iter().enumerate() {
        progress.job_started(index, total, job);
        log::info!(
            "[{}/{}] Flashing {} to {}@0x{:x}",
            index + 1,
            total,
            job.name(),
            job.device(),
            job.offset()
        );

        match flash_job(&port, &uploader, &config, job, *len, dry_run, progress) {
            Ok(done) => {
                progress.job_finished(&done);
                completed.push(done);
            }
            Err(error) => {
                log::error!(
                    "Flashing {} failed: {}; {} of {} partition(s) written",
                    job.name(),
                    error,
                    completed.len(),
                    total
                );
                return Err(FlashFailure {
                    error,
                    completed,
                    failed_job: Some(job.name().to_string()),
                });
            }
        }
    }

    progress.complete(start.elapsed());
    Ok(FlashReport {
        handshake,
        completed,
        dry_run,
    })
}

/// One upload+copy cycle
fn flash_job<P: ConsolePort, U: ImageUploader>(
    port: P,
    uploader: &U,
    config: &BoardConfig,
    job: &FlashJob,
    len: u64,
    dry_run: bool,
    progress: &mut dyn FlashProgress,
) -> Result<CompletedJob, Error> {
    progress.uploading(job, len);
    uploader.upload(&UploadRequest::for_board(config, job.image()), dry_run)?;

    let command = CopyCommand::for_job(job, len);
    progress.copying(job, &command.to_string());
    let copy_time = copy_from_ramdisk(
        port,
        config.console.baudrate,
        &command,
        config.ramdisk_flash.copy_timeout(),
        dry_run,
    )?;

    Ok(CompletedJob {
        name: job.name().to_string(),
        device: job.device().to_string(),
        offset: job.offset(),
        size: len,
        copy_time,
    })
}
