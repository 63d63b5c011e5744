//! Subprocess execution utilities.
//!
//! Every external tool the pipeline drives goes through [`ProcessBuilder::run`],
//! which enforces a timeout, honours cancellation, keeps only the tail of the
//! combined stdout/stderr, and scrubs registered secrets from everything it
//! hands back.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::util::cancel::CancelToken;
use crate::util::secret::{redact, Secret, REDACTED};

/// Default number of captured output bytes kept per process.
pub const DEFAULT_CAPTURE_LIMIT: usize = 64 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still read after the tool itself has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    secret_env: BTreeMap<String, Secret>,
    secrets: Vec<Secret>,
    cwd: Option<PathBuf>,
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The process exited on its own. `None` means it was killed by a signal.
    Exited(Option<i32>),
    /// The timeout elapsed and the process was killed.
    TimedOut(Duration),
    /// Cancellation was requested and the process was killed.
    Cancelled,
}

/// Result of a supervised process run.
#[derive(Debug, Clone)]
pub struct CapturedRun {
    pub status: RunStatus,
    /// Tail of interleaved stdout/stderr, secrets redacted.
    pub output: String,
    pub duration: Duration,
}

impl CapturedRun {
    pub fn success(&self) -> bool {
        matches!(self.status, RunStatus::Exited(Some(0)))
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            RunStatus::Exited(code) => code,
            _ => None,
        }
    }
}

/// Limits applied to a supervised run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub timeout: Option<Duration>,
    pub capture_limit: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            timeout: None,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
        }
    }
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            secret_env: BTreeMap::new(),
            secrets: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Add an argument whose value is a secret.
    pub fn secret_arg(mut self, secret: &Secret) -> Self {
        self.args.push(secret.expose().to_string());
        self.secrets.push(secret.clone());
        self
    }

    /// Set an environment variable holding a secret.
    pub fn secret_env(mut self, key: impl AsRef<str>, secret: &Secret) -> Self {
        self.secret_env.insert(key.as_ref().to_string(), secret.clone());
        self.secrets.push(secret.clone());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, secret) in &self.secret_env {
            cmd.env(key, secret.expose());
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        // Own process group so a kill takes the tool's children with it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }

    /// Run the command to completion, a timeout, or cancellation.
    ///
    /// Returns `Err` only when the process could not be spawned or waited on.
    pub fn run(&self, opts: RunOptions, cancel: &CancelToken) -> Result<CapturedRun> {
        tracing::debug!("running `{}`", self.display_command());

        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let slack = self
            .secrets
            .iter()
            .map(|s| s.expose().len())
            .max()
            .unwrap_or(0);
        let buffer = Arc::new(Mutex::new(TailBuffer::new(opts.capture_limit, slack)));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Arc::clone(&buffer)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Arc::clone(&buffer)));
        }

        let pid = child.id();
        let timed_out = || opts.timeout.filter(|t| start.elapsed() >= *t);

        let mut status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                break RunStatus::Exited(status.code());
            }

            if cancel.is_cancelled() {
                terminate(&mut child);
                break RunStatus::Cancelled;
            }

            if let Some(timeout) = timed_out() {
                terminate(&mut child);
                break RunStatus::TimedOut(timeout);
            }

            thread::sleep(POLL_INTERVAL);
        };

        // A background child of the tool can keep the pipes open after the
        // tool itself exited. It gets the grace period or the rest of the
        // timeout, whichever ends first, then the group is killed.
        if let RunStatus::Exited(_) = status {
            let drained_by = Instant::now() + DRAIN_GRACE;
            while !readers.iter().all(|r| r.is_finished()) {
                if cancel.is_cancelled() {
                    kill_group(pid);
                    status = RunStatus::Cancelled;
                    break;
                }
                if let Some(timeout) = timed_out() {
                    kill_group(pid);
                    status = RunStatus::TimedOut(timeout);
                    break;
                }
                if Instant::now() >= drained_by {
                    tracing::warn!(
                        "`{}` exited but left a process holding its output open; killing it",
                        self.program.display()
                    );
                    kill_group(pid);
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }

        join_readers(readers, DRAIN_GRACE);

        let output = buffer
            .lock()
            .map(|b| b.render(&self.secrets))
            .unwrap_or_default();

        Ok(CapturedRun {
            status,
            output,
            duration: start.elapsed(),
        })
    }

    /// Display the command for logs and error messages, secrets redacted.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        redact(&parts.join(" "), &self.secrets)
    }
}

/// Keeps the last `limit` bytes written to it.
///
/// `slack` extra bytes are retained in front of the tail so that a secret
/// cut by the truncation point can still be recognised and masked.
struct TailBuffer {
    limit: usize,
    slack: usize,
    data: Vec<u8>,
    total: usize,
}

impl TailBuffer {
    fn new(limit: usize, slack: usize) -> Self {
        TailBuffer {
            limit,
            slack,
            data: Vec::new(),
            total: 0,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.total += bytes.len();
        let keep = self.limit + self.slack;
        if self.data.len() > keep {
            let excess = self.data.len() - keep;
            self.data.drain(..excess);
        }
    }

    fn truncated(&self) -> bool {
        self.total > self.limit
    }

    /// The last `limit` bytes as text, every secret replaced.
    fn render(&self, secrets: &[Secret]) -> String {
        let cut = self.data.len().saturating_sub(self.limit);
        let mut out = String::new();
        if self.truncated() {
            out.push_str("[... earlier output truncated ...]\n");
        }

        let mut pos = cut;
        for (start, end) in secret_ranges(&self.data, secrets) {
            if end <= pos {
                continue;
            }
            if start > pos {
                out.push_str(&String::from_utf8_lossy(&self.data[pos..start]));
            }
            out.push_str(REDACTED);
            pos = end;
        }
        out.push_str(&String::from_utf8_lossy(&self.data[pos..]));
        out
    }
}

/// Byte ranges of every secret occurrence, sorted and merged.
fn secret_ranges(data: &[u8], secrets: &[Secret]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        let needle = secret.expose().as_bytes();
        ranges.extend(
            data.windows(needle.len())
                .enumerate()
                .filter(|(_, w)| *w == needle)
                .map(|(i, _)| (i, i + needle.len())),
        );
    }
    ranges.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn spawn_reader<R>(mut source: R, sink: Arc<Mutex<TailBuffer>>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match source.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut buf) = sink.lock() {
                        buf.push(&chunk[..n]);
                    }
                }
            }
        }
    })
}

fn terminate(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

/// Kill the process group led by `pid`, including any background children.
#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

/// Join reader threads, giving up on any still blocked after `wait`.
fn join_readers(readers: Vec<thread::JoinHandle<()>>, wait: Duration) {
    let until = Instant::now() + wait;
    while Instant::now() < until && !readers.iter().all(|r| r.is_finished()) {
        thread::sleep(POLL_INTERVAL);
    }
    for reader in readers {
        if reader.is_finished() {
            let _ = reader.join();
        }
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Resolve a tool given either a bare name (searched in PATH) or a path.
pub fn resolve_tool(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return which::which(path).ok();
    }
    find_executable(program)
}
