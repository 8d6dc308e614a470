//! Pty driver that answers password/passphrase prompts.
//!
//! The child gets a pseudo terminal as its controlling tty, so clients that
//! read secrets from `/dev/tty` (ssh, sftp, scp) prompt on it. Every prompt
//! matching `(?i)(password|passphrase).*:` with nothing but blanks after the
//! colon on its line is answered with the credential followed by `\r`.

use super::{CommandResult, Invocation};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use portable_pty::{native_pty_system, CommandBuilder, PtyPair, PtySize};
use regex::Regex;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PROMPT_PATTERN: &str = r"(?i)(password|passphrase).*:";

static PROMPT: Lazy<Regex> = Lazy::new(|| Regex::new(PROMPT_PATTERN).unwrap());

static PROMPT_BYTES: Lazy<regex::bytes::Regex> =
    Lazy::new(|| regex::bytes::Regex::new(PROMPT_PATTERN).unwrap());

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Output still in flight after the child exits is collected for this long
const DRAIN_GRACE: Duration = Duration::from_millis(50);

/// Tail kept while waiting for a prompt to complete
const MAX_PENDING: usize = 4096;

/// Scans pty output for credential prompts across chunk boundaries.
#[derive(Debug, Default)]
pub struct PromptWatcher {
    pending: String,
}

impl PromptWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed output; returns how many prompts completed in it.
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut prompts = 0;
        let mut from = 0;
        while let Some(found) = PROMPT.find_at(&self.pending, from) {
            // a prompt waits at the end of its line; `password: x` is output
            let rest_of_line = self.pending[found.end()..]
                .split(|c| c == '\r' || c == '\n')
                .next()
                .unwrap_or("");
            if rest_of_line.trim().is_empty() {
                prompts += 1;
                self.pending.drain(..found.end());
                from = 0;
            } else {
                from = found.end();
            }
        }

        // finished lines can no longer turn into a prompt
        if let Some(newline) = self.pending.rfind('\n') {
            self.pending.drain(..=newline);
        }

        if self.pending.len() > MAX_PENDING {
            self.pending.clear();
        }

        prompts
    }
}

fn to_io(err: anyhow::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

fn command_builder(invocation: &Invocation) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(&invocation.program);
    cmd.args(&invocation.args);
    for (key, value) in &invocation.env {
        cmd.env(key, value);
    }
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }
    cmd
}

fn open_pty(cols: u16, rows: u16) -> io::Result<PtyPair> {
    native_pty_system()
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(to_io)
}

/// Forward everything the master side produces into a channel.
fn spawn_output_reader(mut reader: Box<dyn Read + Send>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                // EIO once every slave handle is closed
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

fn send_credential(writer: &mut dyn Write, credential: &str) -> io::Result<()> {
    writer.write_all(credential.as_bytes())?;
    writer.write_all(b"\r")?;
    writer.flush()
}

/// Run to completion, answering prompts, and capture the terminal output.
///
/// The pty merges stdout and stderr, so everything lands in `stdout`;
/// prompt lines and any echo of the credential are removed from it.
pub fn run_captured(invocation: &Invocation, credential: &str) -> io::Result<CommandResult> {
    let pair = open_pty(200, 24)?;
    let mut child = pair
        .slave
        .spawn_command(command_builder(invocation))
        .map_err(to_io)?;
    drop(pair.slave);

    let output_rx = spawn_output_reader(pair.master.try_clone_reader().map_err(to_io)?);
    let mut writer = pair.master.take_writer().map_err(to_io)?;

    let mut watcher = PromptWatcher::new();
    let mut output = Vec::new();
    let mut answered_at = Vec::new();
    let mut on_chunk = |chunk: Vec<u8>, writer: &mut dyn Write| -> io::Result<()> {
        output.extend_from_slice(&chunk);
        for _ in 0..watcher.feed(&chunk) {
            send_credential(writer, credential)?;
            answered_at.push(output.len());
        }
        Ok(())
    };

    let status = loop {
        match output_rx.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => on_chunk(chunk, writer.as_mut())?,
            Err(RecvTimeoutError::Disconnected) => break child.wait()?,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(status) = child.try_wait()? {
                    while let Ok(chunk) = output_rx.recv_timeout(DRAIN_GRACE) {
                        on_chunk(chunk, writer.as_mut())?;
                    }
                    break status;
                }
            }
        }
    };
    drop(writer);
    drop(pair.master);

    Ok(CommandResult {
        exit_code: status.exit_code() as i32,
        stdout: clean_output(&output, &answered_at, credential),
        stderr: String::new(),
    })
}

/// Remove answered prompts and their echo, then normalize line endings.
///
/// `answered_at` holds the output length at each moment the credential was
/// written. Only the prompt line right before such a point and the echoed
/// reply right after it are removed; all other bytes are kept as produced.
fn clean_output(raw: &[u8], answered_at: &[usize], credential: &str) -> String {
    let mut kept = Vec::with_capacity(raw.len());
    let mut cursor = 0;

    for &at in answered_at {
        let at = at.min(raw.len());
        if at < cursor {
            continue;
        }

        let segment = &raw[cursor..at];
        match PROMPT_BYTES.find_iter(segment).last() {
            Some(found) => {
                let line_start = segment[..found.start()]
                    .iter()
                    .rposition(|&b| b == b'\n')
                    .map(|i| i + 1)
                    .unwrap_or(0);
                let mut tail = found.end();
                while tail < segment.len() && matches!(segment[tail], b' ' | b'\t') {
                    tail += 1;
                }
                kept.extend_from_slice(&segment[..line_start]);
                kept.extend_from_slice(&segment[tail..]);
            }
            None => kept.extend_from_slice(segment),
        }

        cursor = at;
        if !credential.is_empty() && raw[cursor..].starts_with(credential.as_bytes()) {
            cursor += credential.len();
        }
        for ending in [&b"\r\n"[..], b"\n", b"\r"] {
            if raw[cursor..].starts_with(ending) {
                cursor += ending.len();
                break;
            }
        }
    }

    kept.extend_from_slice(&raw[cursor..]);
    String::from_utf8_lossy(&kept).replace("\r\n", "\n")
}

/// Restores cooked mode when dropped
struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    fn enable() -> Self {
        Self {
            enabled: crossterm::terminal::enable_raw_mode().is_ok(),
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = crossterm::terminal::disable_raw_mode();
        }
    }
}

/// Run attached to the local terminal.
///
/// Prompts are answered until the user types for the first time; from then
/// on the session is a plain passthrough. Returns the exit code.
pub fn run_interactive(invocation: &Invocation) -> io::Result<i32> {
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let pair = open_pty(cols, rows)?;
    let mut child = pair
        .slave
        .spawn_command(command_builder(invocation))
        .map_err(to_io)?;
    drop(pair.slave);

    let output_rx = spawn_output_reader(pair.master.try_clone_reader().map_err(to_io)?);
    let writer = Arc::new(Mutex::new(pair.master.take_writer().map_err(to_io)?));
    let user_typed = Arc::new(AtomicBool::new(false));

    let _raw = RawModeGuard::enable();

    {
        let writer = Arc::clone(&writer);
        let user_typed = Arc::clone(&user_typed);
        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        user_typed.store(true, Ordering::SeqCst);
                        let mut writer = writer.lock();
                        if writer.write_all(&buf[..n]).and_then(|_| writer.flush()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    let credential = invocation.credential();
    let mut watcher = PromptWatcher::new();
    let mut stdout = io::stdout();
    let mut on_chunk = |chunk: Vec<u8>| -> io::Result<()> {
        stdout.write_all(&chunk)?;
        stdout.flush()?;
        if let Some(credential) = credential {
            if !user_typed.load(Ordering::SeqCst) {
                for _ in 0..watcher.feed(&chunk) {
                    send_credential(&mut *writer.lock(), credential)?;
                }
            }
        }
        Ok(())
    };

    let status = loop {
        match output_rx.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => on_chunk(chunk)?,
            Err(RecvTimeoutError::Disconnected) => break child.wait()?,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(status) = child.try_wait()? {
                    while let Ok(chunk) = output_rx.recv_timeout(DRAIN_GRACE) {
                        on_chunk(chunk)?;
                    }
                    break status;
                }
            }
        }
    };

    Ok(status.exit_code() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_watcher_single_prompt() {
        let mut watcher = PromptWatcher::new();
        assert_eq!(watcher.feed(b"alice@example.com's password: "), 1);
        // consumed, does not fire again
        assert_eq!(watcher.feed(b""), 0);
    }

    #[test]
    fn test_prompt_watcher_split_across_chunks() {
        let mut watcher = PromptWatcher::new();
        assert_eq!(watcher.feed(b"Enter passph"), 0);
        assert_eq!(watcher.feed(b"rase for key '/home/a/.ssh/id_ed25519': "), 1);
    }

    #[test]
    fn test_prompt_watcher_multiple_prompts() {
        let mut watcher = PromptWatcher::new();
        let chunk = b"Password: \r\nPermission denied, please try again.\r\nPASSWORD: ";
        assert_eq!(watcher.feed(chunk), 2);
    }

    #[test]
    fn test_prompt_watcher_ignores_plain_output() {
        let mut watcher = PromptWatcher::new();
        assert_eq!(watcher.feed(b"drwxr-xr-x 2 u g 4096 Jan 1 00:00 sub\n"), 0);
        assert_eq!(watcher.feed(b"password reset complete\n"), 0);
    }

    #[test]
    fn test_prompt_watcher_bounds_pending() {
        let mut watcher = PromptWatcher::new();
        watcher.feed(&vec![b'x'; MAX_PENDING * 2]);
        assert!(watcher.pending.len() <= MAX_PENDING);
    }

    #[test]
    fn test_prompt_watcher_ignores_listing_lines() {
        let mut watcher = PromptWatcher::new();
        let listing = b"-rw-r--r-- 1 u g 3 Jan 1 00:00 password: notes.txt\r\n";
        assert_eq!(watcher.feed(listing), 0);
        assert_eq!(watcher.feed(b"Enter password for db: "), 1);
    }

    #[test]
    fn test_clean_output_drops_prompts() {
        let prompt = b"bob@h's password: ";
        let mut raw = prompt.to_vec();
        raw.extend_from_slice(b"\r\nline one\r\nline two\r\n");
        assert_eq!(clean_output(&raw, &[prompt.len()], "pw"), "line one\nline two\n");
    }

    #[test]
    fn test_clean_output_keeps_listing_intact() {
        let prompt = b"alice@files's password: ";
        let listing = "-rw-r--r-- 1 u g 12 Jan 1 00:00 admin.txt\r\n\
                       -rw-r--r-- 1 u g 3 Jan 1 00:00 password: notes.txt\r\n";
        let mut raw = prompt.to_vec();
        raw.extend_from_slice(b"\r\n");
        raw.extend_from_slice(listing.as_bytes());

        let cleaned = clean_output(&raw, &[prompt.len()], "admin");
        assert_eq!(cleaned, listing.replace("\r\n", "\n"));
        assert!(cleaned.contains("00:00 admin.txt\n"));
        assert!(cleaned.contains("password: notes.txt\n"));
    }

    #[test]
    fn test_clean_output_removes_echoed_reply() {
        let raw = b"Password: hunter2\r\nhunter2 is set\r\n";
        assert_eq!(clean_output(raw, &[10], "hunter2"), "hunter2 is set\n");
    }

    #[test]
    fn test_clean_output_without_prompts_only_normalizes_crlf() {
        let raw = b"a\r\npassword: x\r\nb\rc\n";
        assert_eq!(clean_output(raw, &[], "x"), "a\npassword: x\nb\rc\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captured_answers_prompt() {
        let script = "printf 'Password: '; read -r pw; if [ \"$pw\" = hunter2 ]; then echo ok; else echo bad; exit 5; fi";
        let invocation = Invocation::new("sh").args(["-c", script]);
        let result = run_captured(&invocation, "hunter2").unwrap();
        assert_eq!(result.exit_code, 0, "output: {}", result.stdout);
        assert!(result.stdout.contains("ok"));
        assert!(!result.stdout.contains("hunter2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captured_keeps_output_after_prompt() {
        let script = "printf 'Password: '; read -r pw; echo 'hunter2.txt'; echo 'x password: y'";
        let invocation = Invocation::new("sh").args(["-c", script]);
        let result = run_captured(&invocation, "hunter2").unwrap();
        assert_eq!(result.exit_code, 0, "output: {}", result.stdout);
        assert_eq!(result.stdout, "hunter2.txt\nx password: y\n");
    }
}
