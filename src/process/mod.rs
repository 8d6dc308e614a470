pub mod pty;

use crate::logging::sanitize_args;
use serde::Serialize;
use std::fmt;
use std::process::{Command, Stdio};

/// One external program call: executable, argv and environment overrides.
///
/// When `credential` is set the call runs in interactive password mode: the
/// program gets a pty and any password/passphrase prompt is answered with
/// the credential. The credential never reaches argv or the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    credential: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_interactive(&self) -> bool {
        self.credential.is_some()
    }

    /// Program and arguments with secrets redacted, for logs
    pub fn display_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        sanitize_args(&parts, self.credential())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Exit status and raw output of one process run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// A result for a call that never produced a process
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: message.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stdout and stderr, whichever are non-empty, newline-joined
    pub fn combined_output(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (false, true) => out.to_string(),
            (false, false) => format!("{}\n{}", out, err),
        }
    }

    /// Combined output, or `fallback` when there is none
    pub fn message_or(&self, fallback: &str) -> String {
        let combined = self.combined_output();
        if combined.is_empty() {
            fallback.to_string()
        } else {
            combined
        }
    }
}

/// Runs an [`Invocation`] to completion
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> CommandResult;
}

/// Spawns real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> CommandResult {
        tracing::debug!("Running {}", invocation.display_line());

        let result = match invocation.credential() {
            Some(credential) => pty::run_captured(invocation, credential)
                .unwrap_or_else(|e| CommandResult::failure(e.to_string())),
            None => run_piped(invocation),
        };

        if result.succeeded() {
            tracing::debug!("{} exited 0", invocation.program);
        } else {
            tracing::warn!(
                "{} exited {}: {}",
                invocation.program,
                result.exit_code,
                crate::logging::sanitize(&result.combined_output())
            );
        }
        result
    }
}

fn run_piped(invocation: &Invocation) -> CommandResult {
    let output = Command::new(&invocation.program)
        .args(&invocation.args)
        .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    match output {
        Ok(output) => CommandResult {
            // Killed by a signal has no code
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(e) => CommandResult::failure(format!("Failed to run {}: {}", invocation.program, e)),
    }
}
