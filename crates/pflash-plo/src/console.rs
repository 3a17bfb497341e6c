//! Line-oriented console on top of a [`Transport`]
//!
//! The target prints asynchronously and its timing is not predictable, so
//! reading never blocks indefinitely: [`Console::wait_for`] reads whatever is
//! available, hands each line to a matcher, sleeps a fixed quantum when the
//! line is quiet and gives up once the deadline has passed.

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use pflash_core::error::Result;
use pflash_core::Transport;

/// Pause between read attempts when nothing arrived
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest single read attempt
const READ_SLICE: Duration = Duration::from_millis(20);

/// Bytes requested per read attempt
const READ_CHUNK: usize = 256;

/// Unterminated bytes kept for prompt matching; older ones are dropped
const MAX_PENDING: usize = 512;

/// Longest wait any deadline is allowed to describe
const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Deadline `timeout` after `start`, with `timeout` clamped to [`MAX_WAIT`]
pub fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start.checked_add(timeout.min(MAX_WAIT)).unwrap_or(start)
}

/// A line as seen by a matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Newline-terminated line, trimmed
    Complete(&'a str),
    /// Text received since the last newline while the console is quiet
    /// (prompts are not newline-terminated), trimmed
    Partial(&'a str),
}

impl<'a> Line<'a> {
    /// Line text regardless of completeness
    pub fn text(&self) -> &'a str {
        match self {
            Line::Complete(s) | Line::Partial(s) => s,
        }
    }
}

/// Console connection that assembles received bytes into lines
pub struct Console<T: Transport> {
    transport: T,
    port: String,
    pending: Vec<u8>,
    lines: VecDeque<String>,
    last_line: String,
}

impl<T: Transport> Console<T> {
    /// Wrap an open transport; `port` names the device in logs
    pub fn new(transport: T, port: impl Into<String>) -> Self {
        Self {
            transport,
            port: port.into(),
            pending: Vec::new(),
            lines: VecDeque::new(),
            last_line: String::new(),
        }
    }

    /// Device name
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Most recent non-empty text received, for diagnostics
    pub fn last_line(&self) -> &str {
        &self.last_line
    }

    /// Drop everything received so far, including what the OS buffered
    pub fn clear(&mut self) -> Result<()> {
        self.pending.clear();
        self.lines.clear();
        self.transport.clear_input()
    }

    /// Send `text` followed by a newline
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        log::debug!("plo: {} <- {:?}", self.port, text);
        let mut data = Vec::with_capacity(text.len() + 1);
        data.extend_from_slice(text.as_bytes());
        data.push(b'\n');
        self.transport.write(&data)?;
        self.transport.flush()
    }

    /// Poll lines until `matcher` accepts one or `deadline` passes
    ///
    /// Returns `Ok(None)` on deadline. Complete lines are offered once, in
    /// order; the unterminated tail is offered whenever the console is quiet.
    pub fn wait_for<R>(
        &mut self,
        deadline: Instant,
        mut matcher: impl FnMut(Line<'_>) -> Option<R>,
    ) -> Result<Option<R>> {
        loop {
            while let Some(line) = self.lines.pop_front() {
                if let Some(found) = matcher(Line::Complete(&line)) {
                    return Ok(Some(found));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            if self.fill(READ_SLICE.min(deadline - now))? == 0 {
                let tail = String::from_utf8_lossy(&self.pending).trim().to_string();
                if !tail.is_empty() {
                    if let Some(found) = matcher(Line::Partial(&tail)) {
                        self.pending.clear();
                        return Ok(Some(found));
                    }
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                thread::sleep(POLL_INTERVAL.min(remaining));
            }
        }
    }

    /// Read once and split what arrived into lines
    fn fill(&mut self, timeout: Duration) -> Result<usize> {
        let mut buf = [0u8; READ_CHUNK];
        let n = self.transport.read_nonblock(&mut buf, timeout)?;

        for &b in &buf[..n] {
            if b == b'\n' {
                let raw = std::mem::take(&mut self.pending);
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if !line.is_empty() {
                    log::trace!("plo: {} -> {:?}", self.port, line);
                    self.last_line.clone_from(&line);
                    self.lines.push_back(line);
                }
            } else {
                self.pending.push(b);
            }
        }

        if self.pending.len() > MAX_PENDING {
            let excess = self.pending.len() - MAX_PENDING;
            self.pending.drain(..excess);
        }

        if n > 0 && !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending);
            let tail = tail.trim();
            if !tail.is_empty() {
                self.last_line = tail.to_string();
            }
        }
        Ok(n)
    }

    /// Give back the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pflash_core::ConsolePort;
    use pflash_dummy::{BootState, DummyConfig, DummyTarget};

    fn deadline(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn test_lines_and_partial_prompt() {
        let target = DummyTarget::in_bootloader();
        let mut console = Console::new(target.open(115200).unwrap(), "dummy");
        console.send_line("help").unwrap();

        let mut seen = Vec::new();
        let found = console
            .wait_for(deadline(500), |line| {
                seen.push(line.text().to_string());
                match line {
                    Line::Partial(text) if text == "(plo)%" => Some(()),
                    _ => None,
                }
            })
            .unwrap();
        assert_eq!(found, Some(()));
        assert_eq!(seen.first().map(String::as_str), Some("help"));
        assert_eq!(console.last_line(), "(plo)%");
    }

    #[test]
    fn test_deadline_on_silence() {
        let target = DummyTarget::new(DummyConfig {
            boot_state: BootState::Silent,
            ..DummyConfig::default()
        });
        let mut console = Console::new(target.open(115200).unwrap(), "dummy");
        console.send_line("").unwrap();

        let start = Instant::now();
        let found: Option<()> = console.wait_for(deadline(60), |_| Some(())).unwrap();
        assert_eq!(found, None);
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_deadline_clamps_huge_timeouts() {
        let start = Instant::now();
        assert_eq!(
            deadline_after(start, Duration::from_millis(250)),
            start + Duration::from_millis(250)
        );
        assert_eq!(deadline_after(start, Duration::MAX), start + MAX_WAIT);
        assert_eq!(
            deadline_after(start, Duration::from_secs(u64::MAX) / 2),
            start + MAX_WAIT
        );
    }

    /// Transport streaming one chunk per read, never sending a newline
    struct Streaming {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Transport for Streaming {
        fn write(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
            let Some(mut chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.chunks.push_front(chunk.split_off(n));
            }
            Ok(n)
        }

        fn clear_input(&mut self) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unterminated_output_is_bounded() {
        let mut chunks: VecDeque<Vec<u8>> = (0..64).map(|_| vec![b'#'; 256]).collect();
        chunks.push_back(b"(plo)% ".to_vec());
        let mut console = Console::new(Streaming { chunks }, "stream");

        let found = console
            .wait_for(deadline(2000), |line| match line {
                Line::Partial(text) => text.ends_with("(plo)%").then_some(text.len()),
                Line::Complete(_) => None,
            })
            .unwrap();
        assert!(found.is_some_and(|len| len <= MAX_PENDING));
        assert!(console.pending.len() <= MAX_PENDING);
        assert!(console.last_line().ends_with("(plo)%"));
    }

    #[test]
    fn test_clear_drops_buffered_output() {
        let target = DummyTarget::in_bootloader();
        let mut console = Console::new(target.open(115200).unwrap(), "dummy");
        console.send_line("").unwrap();
        console.clear().unwrap();

        let found: Option<()> = console
            .wait_for(deadline(50), |line| line.text().contains("plo").then_some(()))
            .unwrap();
        assert_eq!(found, None);
    }
}
