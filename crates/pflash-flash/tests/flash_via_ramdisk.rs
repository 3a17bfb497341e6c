//! End-to-end runs against the in-memory target

use std::fs;
use std::path::Path;
use std::time::Duration;

use pflash_core::error::Error;
use pflash_core::{ConfigStore, FlashJob};
use pflash_dummy::{BootState, DummyConfig, DummyTarget, RecordingUploader};
use pflash_flash::{
    flash_via_ramdisk, CompletedJob, FlashFailure, FlashProgress, FlashReport, FlashRequest,
    NoProgress,
};
use pflash_plo::HandshakeResult;

const PROJECT: &str = "aarch64a53-zynqmp-som";

const NVM: &str = r#"
flash0:
  size: 0x1000000
  block_size: 0x10000
  padding_byte: 0xff
  partitions:
    - name: plo
      offs: 0x0
    - name: kernel
      offs: 0x20000
    - name: rootfs
      offs: 0x100000
"#;

/// A project checkout with a descriptor and one image per partition
fn checkout() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let projects = dir.path().join("_projects").join(PROJECT);
    let boot = dir.path().join("_boot").join(PROJECT);
    fs::create_dir_all(&projects).unwrap();
    fs::create_dir_all(&boot).unwrap();
    fs::write(projects.join("nvm.yaml"), NVM).unwrap();
    fs::write(boot.join("part_flash0_plo.img"), vec![0x11u8; 0x8000]).unwrap();
    fs::write(boot.join("part_flash0_kernel.img"), vec![0x22u8; 0x1000]).unwrap();
    fs::write(boot.join("part_flash0_rootfs.img"), vec![0x33u8; 0x40000]).unwrap();
    dir
}

fn request(root: &Path, parts: &[&str], dry_run: bool) -> FlashRequest {
    FlashRequest {
        project: PROJECT.to_string(),
        board: None,
        root: root.to_path_buf(),
        partitions: parts.iter().map(|p| p.to_string()).collect(),
        dry_run,
    }
}

fn configs() -> ConfigStore {
    ConfigStore::new().with_bundled()
}

/// Store holding a single board entry with the given timeouts, in seconds
fn board_config(root: &Path, handshake_s: u64, reboot_s: u64, copy_s: u64) -> ConfigStore {
    let path = root.join("config.json");
    fs::write(
        &path,
        format!(
            r#"{{
  "configuration": [
    {{
      "name": "test-som",
      "project": "{PROJECT}",
      "console": {{ "baudrate": 115200, "reboot_timeout_s": {reboot_s}, "handshake_timeout_s": {handshake_s} }},
      "probe": {{
        "target_config": "target/xilinx_zynqmp.cfg",
        "board_config": "interface/ftdi/digilent-hs2.cfg",
        "upload_timeout_s": 5
      }},
      "ramdisk_flash": {{ "ramdisk_address": "0x1000000", "copy_timeout_s": {copy_s} }}
    }}
  ]
}}"#
        ),
    )
    .unwrap();
    ConfigStore::new().with_file(path)
}

fn run(
    req: &FlashRequest,
    target: &DummyTarget,
    uploader: &RecordingUploader,
) -> Result<FlashReport, FlashFailure> {
    flash_via_ramdisk(req, &configs(), target, uploader, &mut NoProgress)
}

fn names(completed: &[CompletedJob]) -> Vec<&str> {
    completed.iter().map(|c| c.name.as_str()).collect()
}

#[test]
fn test_kernel_only() {
    let dir = checkout();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::new();

    let report = run(&request(dir.path(), &["kernel"], false), &target, &uploader).unwrap();

    assert_eq!(report.handshake, HandshakeResult::AlreadyInBootloader);
    assert_eq!(target.count_command("reboot"), 0);
    assert_eq!(target.copies(), ["copy ramdisk 0 4096 flash0 131072 4096"]);

    let requests = uploader.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].address, 0x1000000);
    assert_eq!(
        requests[0].image,
        dir.path()
            .join("_boot")
            .join(PROJECT)
            .join("part_flash0_kernel.img")
    );

    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].offset, 0x20000);
    assert_eq!(report.completed[0].size, 0x1000);
    assert!(!report.dry_run);
}

#[test]
fn test_jobs_follow_offset_order() {
    let dir = checkout();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::new();

    let report = run(
        &request(dir.path(), &["rootfs", "plo", "kernel"], false),
        &target,
        &uploader,
    )
    .unwrap();

    assert_eq!(names(&report.completed), ["plo", "kernel", "rootfs"]);
    assert_eq!(
        target.copies(),
        [
            "copy ramdisk 0 32768 flash0 0 32768",
            "copy ramdisk 0 4096 flash0 131072 4096",
            "copy ramdisk 0 262144 flash0 1048576 262144",
        ]
    );
    assert_eq!(uploader.requests().len(), 3);
    assert!(target.baudrates().iter().all(|&b| b == 115200));
}

#[test]
fn test_shell_target_is_rebooted_once() {
    let dir = checkout();
    let target = DummyTarget::in_shell();
    let uploader = RecordingUploader::new();

    let report = run(&request(dir.path(), &["plo", "kernel"], false), &target, &uploader).unwrap();

    assert_eq!(report.handshake, HandshakeResult::RebootedIntoBootloader);
    assert_eq!(target.count_command("reboot"), 1);
    assert_eq!(target.copies().len(), 2);
    assert!(target.in_plo());
}

#[test]
fn test_unknown_partitions_are_an_empty_job_set() {
    let dir = checkout();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::new();

    let failure = run(&request(dir.path(), &["bootloader"], false), &target, &uploader).unwrap_err();

    assert!(matches!(failure.error, Error::EmptyJobSet { .. }));
    assert_eq!(failure.exit_code(), 4);
    assert!(failure.failed_job.is_none());
    assert_eq!(target.opens(), 0);
    assert!(uploader.requests().is_empty());
}

#[test]
fn test_dry_run_touches_no_hardware() {
    let dir = checkout();
    let target = DummyTarget::in_shell();
    let uploader = RecordingUploader::new();

    let report = run(
        &request(dir.path(), &["plo", "kernel", "rootfs"], true),
        &target,
        &uploader,
    )
    .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.completed.len(), 3);
    assert_eq!(target.opens(), 0);
    assert_eq!(target.writes(), 0);
    assert!(uploader.requests().is_empty());
    assert_eq!(uploader.dry_requests(), 3);
}

#[test]
fn test_dry_run_still_requires_the_tool() {
    let dir = checkout();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::unavailable();

    let failure = run(&request(dir.path(), &["kernel"], true), &target, &uploader).unwrap_err();

    assert!(matches!(failure.error, Error::PrerequisiteMissing(_)));
    assert_eq!(failure.exit_code(), 2);
    assert_eq!(target.opens(), 0);
    assert_eq!(uploader.dry_requests(), 0);
}

#[test]
fn test_dry_run_still_reports_planning_errors() {
    let dir = checkout();
    fs::remove_file(
        dir.path()
            .join("_boot")
            .join(PROJECT)
            .join("part_flash0_kernel.img"),
    )
    .unwrap();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::new();

    let failure = run(&request(dir.path(), &["kernel"], true), &target, &uploader).unwrap_err();
    assert!(matches!(failure.error, Error::ImageNotFound(_)));

    let failure = run(&request(dir.path(), &["bootloader"], true), &target, &uploader).unwrap_err();
    assert!(matches!(failure.error, Error::EmptyJobSet { .. }));
    assert_eq!(target.opens(), 0);
}

#[test]
fn test_missing_tool_stops_before_hardware() {
    let dir = checkout();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::unavailable();

    let failure = run(&request(dir.path(), &["kernel"], false), &target, &uploader).unwrap_err();

    assert!(matches!(failure.error, Error::PrerequisiteMissing(_)));
    assert_eq!(failure.exit_code(), 2);
    assert_eq!(target.opens(), 0);
}

#[test]
fn test_unknown_project() {
    let dir = checkout();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::new();

    let mut req = request(dir.path(), &["kernel"], false);
    req.project = "riscv64-generic-qemu".to_string();
    let failure = run(&req, &target, &uploader).unwrap_err();

    assert!(matches!(failure.error, Error::ConfigNotFound(_)));
    assert_eq!(failure.exit_code(), 3);
}

#[test]
fn test_oversized_image_is_rejected_up_front() {
    let dir = checkout();
    fs::write(
        dir.path().join("_boot").join(PROJECT).join("part_flash0_plo.img"),
        vec![0u8; 0x20001],
    )
    .unwrap();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::new();

    let failure = run(&request(dir.path(), &["plo", "kernel"], false), &target, &uploader).unwrap_err();

    match failure.error {
        Error::ImageTooLarge {
            partition,
            size,
            capacity,
            ..
        } => {
            assert_eq!(partition, "plo");
            assert_eq!(size, 0x20001);
            assert_eq!(capacity, 0x20000);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(target.opens(), 0);
}

#[test]
fn test_upload_failure_aborts_remaining_jobs() {
    let dir = checkout();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::failing_at(1);

    let failure = run(
        &request(dir.path(), &["plo", "kernel", "rootfs"], false),
        &target,
        &uploader,
    )
    .unwrap_err();

    assert!(matches!(failure.error, Error::UploadFailed { .. }));
    assert_eq!(failure.exit_code(), 6);
    assert_eq!(failure.failed_job.as_deref(), Some("kernel"));
    assert_eq!(names(&failure.completed), ["plo"]);
    assert_eq!(uploader.requests().len(), 2);
    assert_eq!(target.copies().len(), 1);
}

#[test]
fn test_copy_timeout() {
    let dir = checkout();
    let configs = board_config(dir.path(), 1, 2, 1);
    let target = DummyTarget::new(DummyConfig {
        copy_completes: false,
        ..DummyConfig::default()
    });
    let uploader = RecordingUploader::new();

    let failure = flash_via_ramdisk(
        &request(dir.path(), &["kernel", "rootfs"], false),
        &configs,
        &target,
        &uploader,
        &mut NoProgress,
    )
    .unwrap_err();

    match &failure.error {
        Error::CopyTimeout { command, timeout, .. } => {
            assert_eq!(command, "copy ramdisk 0 4096 flash0 131072 4096");
            assert_eq!(*timeout, Duration::from_secs(1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.exit_code(), 7);
    assert_eq!(failure.failed_job.as_deref(), Some("kernel"));
    assert!(failure.completed.is_empty());
    assert_eq!(uploader.requests().len(), 1);
}

#[test]
fn test_silent_target_fails_the_handshake() {
    let dir = checkout();
    let target = DummyTarget::new(DummyConfig {
        boot_state: BootState::Silent,
        ..DummyConfig::default()
    });
    let uploader = RecordingUploader::new();

    let failure = flash_via_ramdisk(
        &request(dir.path(), &["plo", "kernel"], false),
        &board_config(dir.path(), 1, 2, 1),
        &target,
        &uploader,
        &mut NoProgress,
    )
    .unwrap_err();

    assert!(matches!(failure.error, Error::AmbiguousBootState { .. }));
    assert_eq!(failure.exit_code(), 5);
    assert!(failure.completed.is_empty());
    assert!(failure.failed_job.is_none());
    assert!(uploader.requests().is_empty());
    assert!(target.copies().is_empty());
}

#[test]
fn test_huge_timeouts_do_not_overflow() {
    let dir = checkout();
    let target = DummyTarget::in_shell();
    let uploader = RecordingUploader::new();

    let report = flash_via_ramdisk(
        &request(dir.path(), &["kernel"], false),
        &board_config(dir.path(), u64::MAX, u64::MAX, u64::MAX),
        &target,
        &uploader,
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(report.handshake, HandshakeResult::RebootedIntoBootloader);
    assert_eq!(target.copies(), ["copy ramdisk 0 4096 flash0 131072 4096"]);
}

#[derive(Default)]
struct RecordingProgress {
    events: Vec<String>,
}

impl FlashProgress for RecordingProgress {
    fn planned(&mut self, jobs: &[FlashJob]) {
        self.events.push(format!("planned {}", jobs.len()));
    }

    fn handshake_done(&mut self, result: HandshakeResult) {
        self.events.push(format!("handshake {:?}", result));
    }

    fn job_started(&mut self, index: usize, total: usize, job: &FlashJob) {
        self.events
            .push(format!("start {}/{} {}", index + 1, total, job.name()));
    }

    fn copying(&mut self, _job: &FlashJob, command: &str) {
        self.events.push(command.to_string());
    }

    fn job_finished(&mut self, job: &CompletedJob) {
        self.events.push(format!("done {}", job.name));
    }

    fn complete(&mut self, _total: Duration) {
        self.events.push("complete".to_string());
    }
}

#[test]
fn test_progress_events() {
    let dir = checkout();
    let target = DummyTarget::in_bootloader();
    let uploader = RecordingUploader::new();
    let mut progress = RecordingProgress::default();

    flash_via_ramdisk(
        &request(dir.path(), &["kernel", "plo"], false),
        &configs(),
        &target,
        &uploader,
        &mut progress,
    )
    .unwrap();

    assert_eq!(
        progress.events,
        [
            "planned 2",
            "handshake AlreadyInBootloader",
            "start 1/2 plo",
            "copy ramdisk 0 32768 flash0 0 32768",
            "done plo",
            "start 2/2 kernel",
            "copy ramdisk 0 4096 flash0 131072 4096",
            "done kernel",
            "complete",
        ]
    );
}
