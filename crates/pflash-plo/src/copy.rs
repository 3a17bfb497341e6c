//! Copying a staged RAM disk image into flash
//!
//! Once an image sits in target RAM, plo copies it with
//!
//! ```text
//! copy ramdisk 0 <size> <device> <offset> <size>
//! ```
//!
//! and prints its prompt again when done. plo parses the command
//! positionally, so the format must not change.

use std::fmt;
use std::time::{Duration, Instant};

use pflash_core::error::{Error, Result};
use pflash_core::{ConsolePort, FlashJob};

use crate::console::{deadline_after, Console, Line};
use crate::PLO_PROMPT;

/// A plo `copy` from the RAM disk to a block device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCommand {
    /// Bytes to copy
    pub size: u64,
    /// Destination device alias (e.g. `flash0`)
    pub alias: String,
    /// Destination offset
    pub offset: u64,
}

impl CopyCommand {
    /// Copy `size` bytes of the RAM disk into the job's partition
    pub fn for_job(job: &FlashJob, size: u64) -> Self {
        Self {
            size,
            alias: job.device().to_string(),
            offset: job.offset(),
        }
    }
}

impl fmt::Display for CopyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copy ramdisk 0 {size} {alias} {offset} {size}",
            size = self.size,
            alias = self.alias,
            offset = self.offset
        )
    }
}

/// Whether `line` is plo's prompt coming back after `command`
///
/// A complete line must start with the prompt and must not be the echo of
/// the command itself; an unterminated tail must be the bare prompt.
fn is_completion(line: Line<'_>, command: &str) -> bool {
    match line {
        Line::Complete(text) => text.starts_with(PLO_PROMPT) && !text.contains(command),
        Line::Partial(text) => text == PLO_PROMPT,
    }
}

/// Send `command` to plo and wait for it to finish
///
/// Returns how long the copy took. In dry-run mode the command is only
/// logged and nothing is opened or written.
pub fn copy_from_ramdisk<P: ConsolePort>(
    port: P,
    baudrate: u32,
    command: &CopyCommand,
    timeout: Duration,
    dry_run: bool,
) -> Result<Duration> {
    let line = command.to_string();
    if dry_run {
        log::info!("Dry run, plo command = {}", line);
        return Ok(Duration::ZERO);
    }

    let mut console = Console::new(port.open(baudrate)?, port.name());
    console.clear()?;

    log::info!("plo cmd = {}", line);
    let start = Instant::now();
    console.send_line(&line)?;

    let deadline = deadline_after(start, timeout);
    let done = console.wait_for(deadline, |l| is_completion(l, &line).then_some(()))?;
    let elapsed = start.elapsed();
    match done {
        Some(()) => {
            log::debug!("plo: '{}' finished in {:?}", line, elapsed);
            Ok(elapsed)
        }
        None => {
            log::error!(
                "plo did not finish '{}' within {:?} (last line: {:?})",
                line,
                timeout,
                console.last_line()
            );
            Err(Error::CopyTimeout {
                command: line,
                timeout,
                last_line: console.last_line().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pflash_dummy::{DummyConfig, DummyTarget};

    fn command() -> CopyCommand {
        CopyCommand {
            size: 917504,
            alias: "flash0".to_string(),
            offset: 131072,
        }
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            command().to_string(),
            "copy ramdisk 0 917504 flash0 131072 917504"
        );
    }

    #[test]
    fn test_completion_rules() {
        let cmd = command().to_string();
        assert!(is_completion(Line::Partial("(plo)%"), &cmd));
        assert!(is_completion(Line::Complete("(plo)%"), &cmd));
        assert!(!is_completion(Line::Complete(&format!("(plo)% {}", cmd)), &cmd));
        assert!(!is_completion(Line::Partial("(plo)% co"), &cmd));
        assert!(!is_completion(Line::Complete("dev: (plo)%"), &cmd));
    }

    #[test]
    fn test_copy_completes() {
        let target = DummyTarget::in_bootloader();
        let elapsed =
            copy_from_ramdisk(&target, 115200, &command(), Duration::from_secs(1), false).unwrap();
        assert!(elapsed < Duration::from_secs(1));
        assert_eq!(target.copies(), ["copy ramdisk 0 917504 flash0 131072 917504"]);
    }

    #[test]
    fn test_copy_times_out() {
        let target = DummyTarget::new(DummyConfig {
            copy_completes: false,
            ..DummyConfig::default()
        });
        let err = copy_from_ramdisk(&target, 115200, &command(), Duration::from_millis(100), false)
            .unwrap_err();
        match err {
            Error::CopyTimeout {
                command: cmd,
                last_line,
                ..
            } => {
                assert_eq!(cmd, command().to_string());
                assert_eq!(last_line, cmd);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unbounded_timeout() {
        let target = DummyTarget::in_bootloader();
        copy_from_ramdisk(&target, 115200, &command(), Duration::MAX, false).unwrap();
        assert_eq!(target.copies().len(), 1);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let target = DummyTarget::in_bootloader();
        let elapsed =
            copy_from_ramdisk(&target, 115200, &command(), Duration::from_secs(1), true).unwrap();
        assert_eq!(elapsed, Duration::ZERO);
        assert_eq!(target.opens(), 0);
        assert_eq!(target.writes(), 0);
    }
}
