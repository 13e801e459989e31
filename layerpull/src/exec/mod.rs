//! Resource-bounded execution of external tools.
//!
//! Every command the importer runs (the fetch tool and the archive tool)
//! goes through a [`CommandRunner`]. The production runner,
//! [`LimitedExecutor`], applies one [`ProcessLimits`] value to each child
//! through a `pre_exec` hook, so the kernel enforces the ceilings.

pub mod rlimit;

use crate::error::{ExecError, ExecFailure, LimitKind};
use serde::{Deserialize, Serialize};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Arguments starting with one of these have their value redacted in logs and errors.
const SECRET_ARG_PREFIXES: &[&str] = &["--src-creds=", "--creds="];

/// Keep at most this much of a failed child's stderr in the error.
const STDERR_TAIL_BYTES: usize = 4096;

/// Address-space and CPU-time ceilings applied to every spawned command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLimits {
    /// Maximum virtual memory in bytes (RLIMIT_AS).
    #[serde(default = "default_address_space_bytes")]
    pub address_space_bytes: u64,

    /// Maximum CPU time in seconds (RLIMIT_CPU).
    #[serde(default = "default_cpu_time_secs")]
    pub cpu_time_secs: u64,
}

fn default_address_space_bytes() -> u64 {
    1 << 30
}

fn default_cpu_time_secs() -> u64 {
    30
}

impl Default for ProcessLimits {
    fn default() -> Self {
        Self {
            address_space_bytes: default_address_space_bytes(),
            cpu_time_secs: default_cpu_time_secs(),
        }
    }
}

/// Runs one external command to completion and returns its stdout.
///
/// This is the seam the fetcher and the extractor are generic over, so
/// tests can substitute a fake that never spawns processes.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, ExecError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, ExecError> {
        (**self).run(program, args)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, ExecError> {
        (**self).run(program, args)
    }
}

/// [`CommandRunner`] that spawns real children under [`ProcessLimits`].
///
/// Stateless apart from the shared, read-only limits; one instance can
/// serve any number of concurrent imports.
#[derive(Clone, Debug)]
pub struct LimitedExecutor {
    limits: Arc<ProcessLimits>,
}

impl LimitedExecutor {
    pub fn new(limits: Arc<ProcessLimits>) -> Self {
        warn_if_clamped(&limits);
        Self { limits }
    }

    pub fn limits(&self) -> &ProcessLimits {
        &self.limits
    }
}

impl CommandRunner for LimitedExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, ExecError> {
        let command = render_command_line(program, args);
        let limits = *self.limits;

        tracing::debug!(
            command = %command,
            address_space_bytes = limits.address_space_bytes,
            cpu_time_secs = limits.cpu_time_secs,
            "Running bounded command"
        );

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // SAFETY: the hook only calls getrlimit/setrlimit, which are async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                rlimit::apply_limits_raw(&limits).map_err(std::io::Error::from_raw_os_error)
            });
        }

        let output = cmd.output().map_err(|e| ExecError::ExecutionFailed {
            command: command.clone(),
            cause: ExecFailure::Spawn(e),
        })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = stderr_tail(&output.stderr);

        if let Some(signal) = output.status.signal() {
            if let Some(limit) = limit_for_signal(signal) {
                tracing::warn!(command = %command, signal, "Command killed by resource limit");
                return Err(ExecError::ResourceExceeded {
                    command,
                    limit,
                    signal,
                });
            }
            return Err(ExecError::ExecutionFailed {
                command,
                cause: ExecFailure::Signal { signal, stderr },
            });
        }

        Err(ExecError::ExecutionFailed {
            command,
            cause: ExecFailure::Exit {
                code: output.status.code().unwrap_or(-1),
                stderr,
            },
        })
    }
}

/// Map a terminating signal to the limit that produced it.
///
/// RLIMIT_CPU delivers SIGXCPU at the soft limit, a second before the hard
/// limit's SIGKILL. SIGKILL itself is left unclassified: the OOM killer and
/// external kills send it too. RLIMIT_AS has no dedicated signal
/// (allocations just fail), so it surfaces as an ordinary failure.
fn limit_for_signal(signal: i32) -> Option<LimitKind> {
    match signal {
        libc::SIGXCPU => Some(LimitKind::CpuTime),
        _ => None,
    }
}

fn warn_if_clamped(limits: &ProcessLimits) {
    let checks = [
        (libc::RLIMIT_AS, limits.address_space_bytes, "address space"),
        (libc::RLIMIT_CPU, limits.cpu_time_secs, "cpu time"),
    ];
    for (resource, wanted, name) in checks {
        if let Ok((_, hard)) = rlimit::get_rlimit(resource)
            && hard != libc::RLIM_INFINITY as u64
            && wanted > hard
        {
            tracing::warn!(
                limit = name,
                wanted,
                inherited_hard_limit = hard,
                "Configured limit exceeds inherited hard limit; children get the inherited value"
            );
        }
    }
}

/// Render `program args...` for logs and errors, redacting secrets.
pub fn render_command_line(program: &str, args: &[String]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        match SECRET_ARG_PREFIXES.iter().find(|p| arg.starts_with(*p)) {
            Some(prefix) => {
                line.push_str(prefix);
                line.push_str("***");
            }
            None => line.push_str(arg),
        }
    }
    line
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
