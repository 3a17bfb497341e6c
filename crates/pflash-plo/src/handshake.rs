//! Driving the target into the plo console
//!
//! The target may be anywhere when pflash starts: already halted in plo,
//! running the system shell, or somewhere pflash cannot recognise. The
//! handshake is a small state machine:
//!
//! ```text
//! Unknown ──wake──> ProbingForPrompt ──"(plo)%"──────────────────────> InBootloader
//!                          │
//!                          ├──"psh"──> RebootRequested ──> WaitingAfterReboot ──"Waiting for input"──> InBootloader
//!                          │                                      │
//!                          └──timeout──> Ambiguous <──timeout─────┘
//! ```
//!
//! Every wait is bounded by a wall-clock deadline; nothing blocks forever.

use std::thread;
use std::time::{Duration, Instant};

use pflash_core::error::{Error, Result};
use pflash_core::{ConsoleConfig, ConsolePort};

use crate::console::{deadline_after, Console, Line};
use crate::{PLO_PROMPT, READY_TOKEN, REBOOT_COMMAND, SHELL_TOKEN};

/// Pause between attempts to reopen the console after a reboot
const REOPEN_INTERVAL: Duration = Duration::from_millis(100);

/// Handshake states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing known about the target yet
    Unknown,
    /// Wake-up sent, waiting for a prompt
    ProbingForPrompt,
    /// System shell detected, reboot about to be sent
    RebootRequested,
    /// Reboot sent, waiting for plo's boot countdown
    WaitingAfterReboot,
    /// Target halted in plo (success)
    InBootloader,
    /// Target state could not be established (failure)
    Ambiguous,
}

/// How the target ended up in plo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeResult {
    /// plo answered the wake-up right away
    AlreadyInBootloader,
    /// The system was rebooted and stopped in plo
    RebootedIntoBootloader,
}

/// Timing and line parameters of the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeParams {
    pub baudrate: u32,
    /// Time allowed for any prompt to answer the wake-up
    pub handshake_timeout: Duration,
    /// Time allowed between the reboot command and plo's countdown
    pub reboot_timeout: Duration,
}

impl From<&ConsoleConfig> for HandshakeParams {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            baudrate: config.baudrate,
            handshake_timeout: config.handshake_timeout(),
            reboot_timeout: config.reboot_timeout(),
        }
    }
}

/// What answered the wake-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    Bootloader,
    Shell,
}

fn classify(line: Line<'_>) -> Option<Prompt> {
    let text = line.text();
    if text.contains(PLO_PROMPT) {
        Some(Prompt::Bootloader)
    } else if text.contains(SHELL_TOKEN) {
        Some(Prompt::Shell)
    } else {
        None
    }
}

/// Bootloader handshake over one console port
pub struct BootloaderHandshake<P: ConsolePort> {
    port: P,
    params: HandshakeParams,
    state: HandshakeState,
    console: Option<Console<P::Transport>>,
    probe_started: Instant,
    reboot_sent: Instant,
    rebooted: bool,
    last_line: String,
}

impl<P: ConsolePort> BootloaderHandshake<P> {
    /// Prepare a handshake; nothing is opened until [`run`](Self::run)
    pub fn new(port: P, params: HandshakeParams) -> Self {
        let now = Instant::now();
        Self {
            port,
            params,
            state: HandshakeState::Unknown,
            console: None,
            probe_started: now,
            reboot_sent: now,
            rebooted: false,
            last_line: String::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Drive the target into plo
    ///
    /// In dry-run mode nothing is opened or written and the target is
    /// assumed to be in plo already.
    pub fn run(&mut self, dry_run: bool) -> Result<HandshakeResult> {
        if dry_run {
            log::info!("Dry run, skip driving target into plo...");
            self.state = HandshakeState::InBootloader;
            return Ok(HandshakeResult::AlreadyInBootloader);
        }

        loop {
            let next = match self.state {
                HandshakeState::Unknown => self.wake()?,
                HandshakeState::ProbingForPrompt => self.probe()?,
                HandshakeState::RebootRequested => self.request_reboot()?,
                HandshakeState::WaitingAfterReboot => self.wait_after_reboot()?,
                HandshakeState::InBootloader => {
                    self.console = None;
                    return Ok(if self.rebooted {
                        HandshakeResult::RebootedIntoBootloader
                    } else {
                        HandshakeResult::AlreadyInBootloader
                    });
                }
                HandshakeState::Ambiguous => {
                    self.console = None;
                    return Err(Error::AmbiguousBootState {
                        elapsed: self.probe_started.elapsed(),
                        last_line: self.last_line.clone(),
                    });
                }
            };
            log::trace!("plo: handshake {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn open(&self) -> Result<Console<P::Transport>> {
        Ok(Console::new(
            self.port.open(self.params.baudrate)?,
            self.port.name(),
        ))
    }

    /// Unknown -> ProbingForPrompt
    fn wake(&mut self) -> Result<HandshakeState> {
        log::info!("Checking if target is locked in bootloader...");
        let mut console = self.open()?;
        console.clear()?;
        self.probe_started = Instant::now();
        console.send_line("")?;
        self.console = Some(console);
        Ok(HandshakeState::ProbingForPrompt)
    }

    /// ProbingForPrompt -> InBootloader | RebootRequested | Ambiguous
    ///
    /// If nothing answers by half the handshake timeout the wake-up newline
    /// is sent once more; polling continues until the full timeout.
    fn probe(&mut self) -> Result<HandshakeState> {
        let Some(console) = self.console.as_mut() else {
            return Ok(HandshakeState::Unknown);
        };
        let timeout = self.params.handshake_timeout;
        let deadline = deadline_after(self.probe_started, timeout);

        let midpoint = deadline_after(self.probe_started, timeout / 2);
        let mut prompt = console.wait_for(midpoint, classify)?;
        if prompt.is_none() {
            log::debug!("plo: no prompt after {:?}, waking target again", timeout / 2);
            console.send_line("")?;
            prompt = console.wait_for(deadline, classify)?;
        }
        self.last_line = console.last_line().to_string();

        Ok(match prompt {
            Some(Prompt::Bootloader) => {
                log::info!("Success: target is stopped in bootloader");
                HandshakeState::InBootloader
            }
            Some(Prompt::Shell) => {
                log::info!("Target booted into the system, trying to reboot to bootloader");
                HandshakeState::RebootRequested
            }
            None => {
                log::error!(
                    "Neither plo nor psh answered on {} within {:?} (last line: {:?})",
                    self.port.name(),
                    timeout,
                    self.last_line
                );
                HandshakeState::Ambiguous
            }
        })
    }

    /// RebootRequested -> WaitingAfterReboot
    fn request_reboot(&mut self) -> Result<HandshakeState> {
        let mut console = match self.console.take() {
            Some(console) => console,
            None => self.open()?,
        };
        console.send_line(REBOOT_COMMAND)?;
        self.reboot_sent = Instant::now();
        // The line may reset with the target; reopen for the next phase.
        drop(console);
        Ok(HandshakeState::WaitingAfterReboot)
    }

    /// WaitingAfterReboot -> InBootloader, or fail with a timeout
    fn wait_after_reboot(&mut self) -> Result<HandshakeState> {
        let timeout = self.params.reboot_timeout;
        let deadline = deadline_after(self.reboot_sent, timeout);

        let mut console = match self.reopen(deadline) {
            Ok(console) => console,
            Err(e) => {
                self.last_line = e.to_string();
                return Err(self.reboot_timed_out());
            }
        };
        let ready = console.wait_for(deadline, |line| {
            line.text().contains(READY_TOKEN).then_some(())
        })?;
        self.last_line = console.last_line().to_string();

        if ready.is_none() {
            return Err(self.reboot_timed_out());
        }

        console.send_line("")?;
        self.rebooted = true;
        log::info!(
            "Target locked in bootloader after {:?}",
            self.reboot_sent.elapsed()
        );
        Ok(HandshakeState::InBootloader)
    }

    /// WaitingAfterReboot -> Ambiguous
    fn reboot_timed_out(&mut self) -> Error {
        let timeout = self.params.reboot_timeout;
        log::error!(
            "Target did not reach plo within {:?} after reboot (last line: {:?})",
            timeout,
            self.last_line
        );
        self.state = HandshakeState::Ambiguous;
        Error::HandshakeTimeout {
            command: REBOOT_COMMAND.to_string(),
            timeout,
            last_line: self.last_line.clone(),
        }
    }

    /// Open the console, retrying until `deadline` while the device is away
    fn reopen(&self, deadline: Instant) -> Result<Console<P::Transport>> {
        loop {
            match self.open() {
                Ok(console) => return Ok(console),
                Err(e) if Instant::now() + REOPEN_INTERVAL < deadline => {
                    log::debug!("plo: reopening {} failed ({}), retrying", self.port.name(), e);
                    thread::sleep(REOPEN_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Make sure the target is stopped in plo
pub fn enter_bootloader<P: ConsolePort>(
    port: P,
    params: HandshakeParams,
    dry_run: bool,
) -> Result<HandshakeResult> {
    BootloaderHandshake::new(port, params).run(dry_run)
}
