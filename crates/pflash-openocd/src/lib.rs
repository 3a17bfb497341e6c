//! pflash-openocd - Stage images in target RAM with OpenOCD
//!
//! One upload is one blocking OpenOCD invocation running a fixed command
//! sequence:
//!
//! ```text
//! openocd -f <board_config> -f <target_config>
//!         -c "reset_config srst_only" -c init -c halt
//!         -c "load_image \"<image>\" <address> bin"
//!         -c resume -c exit
//! ```
//!
//! The CPU is halted while the image is written to RAM and resumed
//! afterwards, so plo is back at its prompt for the copy that follows.

mod locate;
mod process;

use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use pflash_core::error::{Error, Result};
use pflash_core::{ImageUploader, UploadRequest};

pub use locate::{find_in_path, which};
pub use process::{run_with_timeout, Outcome};

/// Name of the OpenOCD executable
pub const OPENOCD: &str = "openocd";

/// OpenOCD arguments for one upload, in execution order
pub fn upload_args(request: &UploadRequest) -> Vec<String> {
    vec![
        "-f".to_string(),
        request.board_config.display().to_string(),
        "-f".to_string(),
        request.target_config.display().to_string(),
        "-c".to_string(),
        "reset_config srst_only".to_string(),
        "-c".to_string(),
        "init".to_string(),
        "-c".to_string(),
        "halt".to_string(),
        "-c".to_string(),
        format!(
            "load_image \"{}\" 0x{:x} bin",
            request.image.display(),
            request.address
        ),
        "-c".to_string(),
        "resume".to_string(),
        "-c".to_string(),
        "exit".to_string(),
    ]
}

/// [`ImageUploader`] driving OpenOCD
#[derive(Debug, Clone, Default)]
pub struct OpenOcd {
    binary: Option<PathBuf>,
}

impl OpenOcd {
    /// OpenOCD looked up in `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// OpenOCD at an explicit location
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    fn resolve(&self) -> Result<PathBuf> {
        match &self.binary {
            Some(binary) if binary.is_file() => Ok(binary.clone()),
            Some(binary) => Err(Error::PrerequisiteMissing(format!(
                "OpenOCD binary not found at {}",
                binary.display()
            ))),
            None => which(OPENOCD),
        }
    }
}

impl ImageUploader for OpenOcd {
    fn name(&self) -> &str {
        OPENOCD
    }

    fn check_available(&self) -> Result<()> {
        let binary = self.resolve()?;
        log::debug!("openocd: using {}", binary.display());
        Ok(())
    }

    fn upload(&self, request: &UploadRequest, dry_run: bool) -> Result<()> {
        if !request.image.is_file() {
            return Err(Error::ImageNotFound(request.image.clone()));
        }

        let args = upload_args(request);
        if dry_run {
            log::info!("Dry run, OpenOCD cmd = {} {}", OPENOCD, args.join(" "));
            return Ok(());
        }

        let binary = self.resolve()?;
        log::info!("OpenOCD cmd = {} {}", binary.display(), args.join(" "));

        let mut command = Command::new(&binary);
        command.args(&args);

        let start = Instant::now();
        let outcome =
            run_with_timeout(command, request.timeout).map_err(|e| Error::UploadFailed {
                image: request.image.clone(),
                status: "not started".to_string(),
                output: e.to_string(),
            })?;

        match outcome {
            Outcome::Exited { status, output } if status.success() => {
                log::debug!("openocd: output:\n{}", output.trim_end());
                log::info!(
                    "Uploaded {} to 0x{:x} in {:?}",
                    request.image.display(),
                    request.address,
                    start.elapsed()
                );
                Ok(())
            }
            Outcome::Exited { status, output } => {
                log::error!("openocd: {}, output:\n{}", status, output.trim_end());
                Err(Error::UploadFailed {
                    image: request.image.clone(),
                    status: status.to_string(),
                    output: output.trim_end().to_string(),
                })
            }
            Outcome::TimedOut { output } => {
                log::error!(
                    "openocd: killed after {:?}, output:\n{}",
                    request.timeout,
                    output.trim_end()
                );
                Err(Error::UploadTimeout {
                    image: request.image.clone(),
                    timeout: request.timeout,
                    output: output.trim_end().to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    fn request(image: &Path, timeout: Duration) -> UploadRequest {
        UploadRequest {
            target_config: PathBuf::from("target/xilinx_zynqmp.cfg"),
            board_config: PathBuf::from("interface/ftdi/digilent-hs2.cfg"),
            image: image.to_path_buf(),
            address: 0x1000000,
            timeout,
        }
    }

    #[test]
    fn test_command_sequence() {
        let args = upload_args(&request(Path::new("/b/part_flash0_kernel.img"), Duration::ZERO));
        assert_eq!(
            args,
            [
                "-f",
                "interface/ftdi/digilent-hs2.cfg",
                "-f",
                "target/xilinx_zynqmp.cfg",
                "-c",
                "reset_config srst_only",
                "-c",
                "init",
                "-c",
                "halt",
                "-c",
                "load_image \"/b/part_flash0_kernel.img\" 0x1000000 bin",
                "-c",
                "resume",
                "-c",
                "exit",
            ]
        );
    }

    #[test]
    fn test_dry_run_upload_does_not_invoke_openocd() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("part_flash0_plo.img");
        fs::write(&image, [0u8; 16]).unwrap();

        let uploader = OpenOcd::with_binary(dir.path().join("missing-openocd"));
        assert!(uploader.check_available().is_err());
        uploader
            .upload(&request(&image, Duration::from_secs(1)), true)
            .unwrap();
    }

    #[test]
    fn test_missing_image() {
        let uploader = OpenOcd::new();
        let err = uploader
            .upload(&request(Path::new("/nonexistent/a.img"), Duration::ZERO), true)
            .unwrap_err();
        assert!(matches!(err, Error::ImageNotFound(_)));
    }

    /// All runs share one test so no other test forks while scripts are
    /// being written.
    #[cfg(unix)]
    #[test]
    fn test_invocation_outcomes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("part_flash0_kernel.img");
        fs::write(&image, [0xA5u8; 64]).unwrap();

        let fake = |name: &str, body: &str| {
            let path = dir.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            OpenOcd::with_binary(path)
        };

        // Success, arguments passed through verbatim
        let args_file = dir.path().join("args.txt");
        let ok = fake(
            "openocd-ok",
            &format!("printf '%s\\n' \"$@\" > '{}'", args_file.display()),
        );
        ok.check_available().unwrap();
        let req = request(&image, Duration::from_secs(10));
        ok.upload(&req, false).unwrap();
        let recorded = fs::read_to_string(&args_file).unwrap();
        assert_eq!(recorded.lines().collect::<Vec<_>>(), upload_args(&req));

        // Non-zero exit
        let failing = fake(
            "openocd-fail",
            "echo 'Error: unable to open ftdi device' >&2\nexit 1",
        );
        match failing.upload(&req, false).unwrap_err() {
            Error::UploadFailed { output, .. } => {
                assert!(output.contains("unable to open ftdi device"))
            }
            other => panic!("unexpected error: {other}"),
        }

        // Hanging
        let hanging = fake("openocd-hang", "echo 'Info : halted'\nexec sleep 10");
        let start = Instant::now();
        let err = hanging
            .upload(&request(&image, Duration::from_millis(300)), false)
            .unwrap_err();
        assert!(matches!(err, Error::UploadTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
