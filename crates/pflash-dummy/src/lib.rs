//! pflash-dummy - In-memory target emulator for testing
//!
//! This crate provides a dummy target whose serial console behaves like a
//! Phoenix-RTOS board: it either sits in the plo bootloader or runs the
//! system shell (psh), answers a wake-up newline with its prompt, reboots
//! into plo on `reboot`, and acknowledges `copy` commands. It also provides
//! an uploader that records requests instead of driving a probe.
//!
//! Everything the host sends is recorded so tests can assert on it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use pflash_core::error::{Error, Result};
use pflash_core::{ConsolePort, ImageUploader, Transport, UploadRequest};

/// plo prompt as printed by the emulated bootloader
pub const PLO_PROMPT: &str = "(plo)% ";
/// psh prompt as printed by the emulated system
pub const PSH_PROMPT: &str = "(psh)% ";

/// What the target runs when the test starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    /// Halted in the plo console
    Bootloader,
    /// Running the system shell
    Shell,
    /// Not answering at all
    Silent,
}

/// Configuration for the dummy target
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Initial state
    pub boot_state: BootState,
    /// Echo received command lines back, like a terminal
    pub echo: bool,
    /// Whether a reboot ends in plo's "Waiting for input" countdown
    pub reboot_reaches_bootloader: bool,
    /// Whether plo prints its prompt after a copy
    pub copy_completes: bool,
    /// Number of opens that fail right after a reboot, like a USB-serial
    /// adapter that re-enumerates while the target resets
    pub failing_opens_after_reboot: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            boot_state: BootState::Bootloader,
            echo: true,
            reboot_reaches_bootloader: true,
            copy_completes: true,
            failing_opens_after_reboot: 0,
        }
    }
}

/// Internal console mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plo,
    Psh,
    /// plo boot countdown, waiting for a key
    AwaitingInput,
    Silent,
}

#[derive(Debug)]
struct TargetState {
    config: DummyConfig,
    mode: Mode,
    /// Partial line typed by the host
    input: Vec<u8>,
    /// Bytes ready to be read by the host
    output: VecDeque<u8>,
    /// Chunks the target will emit later, one per host read
    scheduled: VecDeque<Vec<u8>>,
    failing_opens: usize,
    opens: usize,
    baudrates: Vec<u32>,
    writes: usize,
    commands: Vec<String>,
}

impl TargetState {
    fn say(&mut self, text: &str) {
        self.output.extend(text.as_bytes());
    }

    fn schedule(&mut self, text: &str) {
        self.scheduled.push_back(text.as_bytes().to_vec());
    }

    fn receive(&mut self, data: &[u8]) {
        self.writes += 1;
        for &b in data {
            match b {
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.input).into_owned();
                    self.input.clear();
                    self.handle_line(line);
                }
                b'\r' => {}
                _ => self.input.push(b),
            }
        }
    }

    fn handle_line(&mut self, line: String) {
        log::trace!("dummy: received {:?} in {:?}", line, self.mode);
        self.commands.push(line.clone());

        if self.config.echo && matches!(self.mode, Mode::Plo | Mode::Psh) {
            self.say(&line);
            self.say("\r\n");
        }

        match self.mode {
            Mode::Plo => {
                if line.starts_with("copy ") && !self.config.copy_completes {
                    return;
                }
                self.schedule(PLO_PROMPT);
            }
            Mode::Psh if line.trim() == "reboot" => {
                self.schedule("\r\nPhoenix-RTOS loader v. 1.21 rev: 4d7f3fe\r\n");
                self.schedule("hal: Cortex-A53 ZynqMP\r\n");
                self.schedule("dev: Initializing devices\r\n");
                self.failing_opens = self.config.failing_opens_after_reboot;
                if self.config.reboot_reaches_bootloader {
                    self.schedule("Waiting for input,  3 [s]\r\n");
                    self.mode = Mode::AwaitingInput;
                } else {
                    self.mode = Mode::Silent;
                }
            }
            Mode::Psh => self.schedule(PSH_PROMPT),
            Mode::AwaitingInput => {
                self.mode = Mode::Plo;
                self.schedule(PLO_PROMPT);
            }
            Mode::Silent => {}
        }
    }
}

/// Emulated target, reachable as a [`ConsolePort`]
///
/// Clones share the same target.
#[derive(Debug, Clone)]
pub struct DummyTarget {
    name: String,
    state: Rc<RefCell<TargetState>>,
}

impl DummyTarget {
    /// Create a target with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let mode = match config.boot_state {
            BootState::Bootloader => Mode::Plo,
            BootState::Shell => Mode::Psh,
            BootState::Silent => Mode::Silent,
        };
        Self {
            name: "dummy".to_string(),
            state: Rc::new(RefCell::new(TargetState {
                failing_opens: 0,
                config,
                mode,
                input: Vec::new(),
                output: VecDeque::new(),
                scheduled: VecDeque::new(),
                opens: 0,
                baudrates: Vec::new(),
                writes: 0,
                commands: Vec::new(),
            })),
        }
    }

    /// Target halted in plo with default behaviour
    pub fn in_bootloader() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Target running the system shell with default behaviour
    pub fn in_shell() -> Self {
        Self::new(DummyConfig {
            boot_state: BootState::Shell,
            ..DummyConfig::default()
        })
    }

    /// Number of successful opens so far
    pub fn opens(&self) -> usize {
        self.state.borrow().opens
    }

    /// Baud rates used by every successful open
    pub fn baudrates(&self) -> Vec<u32> {
        self.state.borrow().baudrates.clone()
    }

    /// Number of write calls made by the host
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    /// Every complete line sent by the host, in order
    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    /// Lines sent by the host that equal `command` once trimmed
    pub fn count_command(&self, command: &str) -> usize {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| c.trim() == command)
            .count()
    }

    /// Copy commands received so far
    pub fn copies(&self) -> Vec<String> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| c.starts_with("copy "))
            .cloned()
            .collect()
    }

    /// Whether the target currently sits in the plo console
    pub fn in_plo(&self) -> bool {
        self.state.borrow().mode == Mode::Plo
    }
}

impl ConsolePort for DummyTarget {
    type Transport = DummyTransport;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, baudrate: u32) -> Result<DummyTransport> {
        let mut state = self.state.borrow_mut();
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(Error::serial(&self.name, "No such file or directory"));
        }
        state.opens += 1;
        state.baudrates.push(baudrate);
        Ok(DummyTransport {
            state: Rc::clone(&self.state),
        })
    }
}

/// Open connection to a [`DummyTarget`]
#[derive(Debug)]
pub struct DummyTransport {
    state: Rc<RefCell<TargetState>>,
}

impl Transport for DummyTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.state.borrow_mut().receive(data);
        Ok(())
    }

    fn read_nonblock(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        if let Some(chunk) = state.scheduled.pop_front() {
            state.output.extend(chunk);
        }
        let n = buf.len().min(state.output.len());
        for (dst, src) in buf.iter_mut().zip(state.output.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn clear_input(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.output.clear();
        state.scheduled.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Uploader that records requests instead of running a probe
#[derive(Debug)]
pub struct RecordingUploader {
    available: bool,
    fail_at: Option<usize>,
    requests: RefCell<Vec<UploadRequest>>,
    dry_requests: Cell<usize>,
}

impl Default for RecordingUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingUploader {
    /// Uploader whose every upload succeeds
    pub fn new() -> Self {
        Self {
            available: true,
            fail_at: None,
            requests: RefCell::new(Vec::new()),
            dry_requests: Cell::new(0),
        }
    }

    /// Uploader whose tool is missing from the host
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Make the `index`-th real upload (0-based) fail
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::new()
        }
    }

    /// Real (non dry-run) upload requests, in order
    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.borrow().clone()
    }

    /// Number of requests seen in dry-run mode
    pub fn dry_requests(&self) -> usize {
        self.dry_requests.get()
    }
}

impl ImageUploader for RecordingUploader {
    fn name(&self) -> &str {
        "dummy-probe"
    }

    fn check_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::PrerequisiteMissing(
                "dummy-probe binary not found in PATH".to_string(),
            ))
        }
    }

    fn upload(&self, request: &UploadRequest, dry_run: bool) -> Result<()> {
        if dry_run {
            self.dry_requests.set(self.dry_requests.get() + 1);
            return Ok(());
        }
        let index = self.requests.borrow().len();
        self.requests.borrow_mut().push(request.clone());
        if self.fail_at == Some(index) {
            return Err(Error::UploadFailed {
                image: request.image.clone(),
                status: "exit status: 1".to_string(),
                output: "Error: JTAG scan chain interrogation failed".to_string(),
            });
        }
        Ok(())
    }
}
