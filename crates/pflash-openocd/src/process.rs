//! Running a tool under a wall-clock limit

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Pause between checks on the child process
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a tool run ended
#[derive(Debug)]
pub enum Outcome {
    /// The tool exited on its own
    Exited { status: ExitStatus, output: String },
    /// The tool was killed after the time limit
    TimedOut { output: String },
}

/// Run `command` to completion, killing it after `timeout`
///
/// stdout and stderr are captured together, in the order they were written.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> io::Result<Outcome> {
    let mut capture = tempfile::tempfile()?;
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(capture.try_clone()?))
        .stderr(Stdio::from(capture.try_clone()?));

    let mut child = command.spawn()?;
    let start = Instant::now();

    let status = loop {
        match child.try_wait()? {
            Some(status) => break Some(status),
            None if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let output = read_capture(&mut capture)?;
    Ok(match status {
        Some(status) => Outcome::Exited { status, output },
        None => Outcome::TimedOut { output },
    })
}

fn read_capture(file: &mut File) -> io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
