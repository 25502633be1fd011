//! Child process supervision.
//!
//! The `ProcessSupervisor` owns every child of a session:
//! - Spawning with stdio bound to null, the terminal, a file, or a pipe
//! - Draining captured output into log files on background tasks
//! - Handing out the primary child's monitored stream
//! - Ordered shutdown (SIGTERM, grace period, SIGKILL)
//!
//! Children are spawned with `kill_on_drop`, so a supervisor dropped on an
//! error path still leaves nothing running.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SessionError};

/// Default time a child gets to exit after SIGTERM.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Time allowed for drain tasks to flush once their child is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Process specification
// ============================================================================

/// Role of a child within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Player,
    Encoder,
    Publisher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Encoder => "encoder",
            Self::Publisher => "publisher",
        }
    }

    /// Base name of the role's log sinks in the workspace.
    pub fn log_name(&self) -> &'static str {
        match self {
            Self::Player => "ffplay",
            Self::Encoder => "ffmpeg",
            Self::Publisher => "ndnrtc-client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a child's stdin comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputBinding {
    Null,
    Inherit,
    /// Read from a file or named pipe
    File(PathBuf),
}

/// Where a child's stdout or stderr goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputBinding {
    Null,
    Inherit,
    /// Copied into a file by a background task
    Drain(PathBuf),
    /// Handed to the caller through [`ProcessSupervisor::take_monitored`]
    Monitored,
}

/// Everything needed to start one child.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub role: Role,
    pub program: String,
    pub args: Vec<String>,
    pub stdin: InputBinding,
    pub stdout: OutputBinding,
    pub stderr: OutputBinding,
}

impl ProcessSpec {
    pub fn new(role: Role, program: impl Into<String>) -> Self {
        Self {
            role,
            program: program.into(),
            args: Vec::new(),
            stdin: InputBinding::Null,
            stdout: OutputBinding::Null,
            stderr: OutputBinding::Null,
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

    pub fn stdin(mut self, binding: InputBinding) -> Self {
        self.stdin = binding;
        self
    }

    pub fn stdout(mut self, binding: OutputBinding) -> Self {
        self.stdout = binding;
        self
    }

    pub fn stderr(mut self, binding: OutputBinding) -> Self {
        self.stderr = binding;
        self
    }

    /// Program and arguments joined for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Captured output stream of a monitored child.
pub type MonitoredStream = Box<dyn AsyncRead + Send + Unpin>;

struct Supervised {
    role: Role,
    program: String,
    child: Child,
    monitored: Option<MonitoredStream>,
    status: Option<ExitStatus>,
}

impl Supervised {
    /// Records and returns the exit status if the child has exited.
    fn poll_exit(&mut self) -> Option<ExitStatus> {
        if self.status.is_none() {
            match self.child.try_wait() {
                Ok(status) => self.status = status,
                Err(e) => debug!(role = %self.role, error = %e, "Failed to poll child"),
            }
        }
        self.status
    }
}

/// Owner of a session's child processes.
pub struct ProcessSupervisor {
    children: Vec<Supervised>,
    drains: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            children: Vec::new(),
            drains: Vec::new(),
            shutdown_grace,
        }
    }

    /// Starts a child according to `spec`.
    ///
    /// Drain sinks are created before the child starts, so an unusable
    /// path fails the spawn. Returns the child's pid.
    pub fn spawn(&mut self, spec: ProcessSpec) -> Result<u32> {
        let spawn_error = |source: io::Error| SessionError::Spawn {
            role: spec.role,
            program: spec.program.clone(),
            source,
        };

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).kill_on_drop(true);

        cmd.stdin(input_stdio(&spec.stdin).map_err(spawn_error)?);
        let stdout_sink = open_sink(&spec.stdout).map_err(spawn_error)?;
        let stderr_sink = open_sink(&spec.stderr).map_err(spawn_error)?;
        cmd.stdout(output_stdio(&spec.stdout));
        cmd.stderr(output_stdio(&spec.stderr));

        debug!(role = %spec.role, command = %spec.command_line(), "Spawning child process");
        let mut child = cmd.spawn().map_err(spawn_error)?;
        let pid = child.id().unwrap_or_default();

        let mut monitored: Option<MonitoredStream> = None;

        if let Some(stdout) = child.stdout.take() {
            match stdout_sink {
                Some(sink) => self.drains.push(spawn_drain(spec.role, "stdout", stdout, sink)),
                None => monitored = Some(Box::new(stdout)),
            }
        }
        if let Some(stderr) = child.stderr.take() {
            match stderr_sink {
                Some(sink) => self.drains.push(spawn_drain(spec.role, "stderr", stderr, sink)),
                None => monitored = Some(Box::new(stderr)),
            }
        }

        info!(role = %spec.role, pid, program = %spec.program, "Spawned child process");

        self.children.push(Supervised {
            role: spec.role,
            program: spec.program,
            child,
            monitored,
            status: None,
        });
        Ok(pid)
    }

    /// Number of children spawned so far.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn pid(&self, role: Role) -> Option<u32> {
        self.find(role).and_then(|c| c.child.id())
    }

    /// Returns true while the child for `role` is running.
    pub fn is_alive(&mut self, role: Role) -> bool {
        self.find_mut(role)
            .map(|c| c.poll_exit().is_none())
            .unwrap_or(false)
    }

    /// Exit status of the child for `role`, once it has exited.
    pub fn exit_status(&mut self, role: Role) -> Option<ExitStatus> {
        self.find_mut(role).and_then(Supervised::poll_exit)
    }

    /// Takes the monitored output stream of the child for `role`.
    pub fn take_monitored(&mut self, role: Role) -> Option<MonitoredStream> {
        self.find_mut(role).and_then(|c| c.monitored.take())
    }

    /// Waits for the child for `role` to exit.
    ///
    /// Cancel safe. Resolves immediately with `None` if there is no such
    /// child or its status cannot be read.
    pub async fn wait_for(&mut self, role: Role) -> Option<ExitStatus> {
        let supervised = self.find_mut(role)?;
        if let Some(status) = supervised.status {
            return Some(status);
        }
        match supervised.child.wait().await {
            Ok(status) => {
                supervised.status = Some(status);
                Some(status)
            }
            Err(e) => {
                warn!(role = %role, error = %e, "Failed to wait for child");
                None
            }
        }
    }

    /// Terminates every child in reverse spawn order, then waits for drains.
    ///
    /// Each running child gets SIGTERM and `shutdown_grace` to exit before
    /// SIGKILL. Safe to call repeatedly; failures are logged, never returned.
    pub async fn stop_all(&mut self) {
        let grace = self.shutdown_grace;

        for supervised in self.children.iter_mut().rev() {
            if let Some(status) = supervised.poll_exit() {
                trace!(role = %supervised.role, %status, "Child already exited");
                continue;
            }
            terminate(supervised, grace).await;
        }

        for mut handle in self.drains.drain(..) {
            match timeout(DRAIN_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Output drain task failed"),
                Err(_) => {
                    debug!("Output drain still open after child exit, aborting");
                    handle.abort();
                }
            }
        }
    }

    fn find(&self, role: Role) -> Option<&Supervised> {
        self.children.iter().find(|c| c.role == role)
    }

    fn find_mut(&mut self, role: Role) -> Option<&mut Supervised> {
        self.children.iter_mut().find(|c| c.role == role)
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_GRACE)
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        for handle in &self.drains {
            handle.abort();
        }
    }
}

async fn terminate(supervised: &mut Supervised, grace: Duration) {
    let role = supervised.role;

    if let Some(pid) = supervised.child.id() {
        debug!(role = %role, pid, "Sending SIGTERM");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            debug!(role = %role, pid, error = %e, "SIGTERM failed");
        }
    }

    match timeout(grace, supervised.child.wait()).await {
        Ok(Ok(status)) => {
            supervised.status = Some(status);
            info!(role = %role, program = %supervised.program, %status, "Child stopped");
            return;
        }
        Ok(Err(e)) => warn!(role = %role, error = %e, "Failed to wait for child"),
        Err(_) => warn!(
            role = %role,
            grace_ms = grace.as_millis() as u64,
            "Child ignored SIGTERM, killing"
        ),
    }

    match supervised.child.kill().await {
        Ok(()) => {
            supervised.status = supervised.child.try_wait().ok().flatten();
            info!(role = %role, program = %supervised.program, "Child killed");
        }
        Err(e) => warn!(role = %role, error = %e, "Failed to kill child"),
    }
}

fn input_stdio(binding: &InputBinding) -> io::Result<Stdio> {
    Ok(match binding {
        InputBinding::Null => Stdio::null(),
        InputBinding::Inherit => Stdio::inherit(),
        InputBinding::File(path) => Stdio::from(open_for_reading(path)?),
    })
}

/// Opens a file or FIFO for reading without waiting for a writer.
fn open_for_reading(path: &Path) -> io::Result<std::fs::File> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)?;

    // The child expects ordinary blocking reads.
    let fd = file.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags - OFlag::O_NONBLOCK))?;
    Ok(file)
}

fn open_sink(binding: &OutputBinding) -> io::Result<Option<tokio::fs::File>> {
    match binding {
        OutputBinding::Drain(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Ok(Some(tokio::fs::File::from_std(file)))
        }
        _ => Ok(None),
    }
}

fn output_stdio(binding: &OutputBinding) -> Stdio {
    match binding {
        OutputBinding::Null => Stdio::null(),
        OutputBinding::Inherit => Stdio::inherit(),
        OutputBinding::Drain(_) | OutputBinding::Monitored => Stdio::piped(),
    }
}

fn spawn_drain<R>(role: Role, stream: &'static str, mut source: R, mut sink: tokio::fs::File) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        match tokio::io::copy(&mut source, &mut sink).await {
            Ok(bytes) => trace!(role = %role, stream, bytes, "Output drain finished"),
            Err(e) => debug!(role = %role, stream, error = %e, "Output drain ended with error"),
        }
        if let Err(e) = sink.flush().await {
            debug!(role = %role, stream, error = %e, "Failed to flush output sink");
        }
    })
}

// ============================================================================
// Monitoring
// ============================================================================

/// Why the monitor loop ended.
#[derive(Debug)]
pub enum MonitorExit {
    /// The primary exited with the given code (`None` if killed by a signal)
    ProcessExited(Option<i32>),
    StreamError(io::Error),
    /// The operator asked the session to stop
    Interrupted,
}

impl fmt::Display for MonitorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessExited(Some(code)) => write!(f, "process exited with code {code}"),
            Self::ProcessExited(None) => f.write_str("process terminated by signal"),
            Self::StreamError(e) => write!(f, "output stream error: {e}"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Options for [`monitor_primary`].
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    /// Print each line to stdout
    pub echo: bool,
    /// File that receives a copy of each line
    pub sink: Option<PathBuf>,
}

/// Follows the primary child's monitored output until the session should end.
///
/// Output is split on `\n` and `\r`, since players redraw their status line
/// with carriage returns. End of file on the stream is not an exit by
/// itself: the loop then waits for the child and reports its exit code.
pub async fn monitor_primary(
    supervisor: &mut ProcessSupervisor,
    role: Role,
    options: &MonitorOptions,
    shutdown: &CancellationToken,
) -> MonitorExit {
    let Some(stream) = supervisor.take_monitored(role) else {
        debug!(role = %role, "No monitored stream, waiting for exit");
        return tokio::select! {
            biased;
            _ = shutdown.cancelled() => MonitorExit::Interrupted,
            status = supervisor.wait_for(role) => MonitorExit::ProcessExited(status.and_then(|s| s.code())),
        };
    };

    let mut sink = match &options.sink {
        Some(path) => match tokio::fs::OpenOptions::new().create(true).append(true).open(path).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open monitor log");
                None
            }
        },
        None => None,
    };

    let mut reader = BufReader::new(stream);
    let mut partial = Vec::new();

    let exit = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break MonitorExit::Interrupted,

            read = read_segment(&mut reader, &mut partial) => match read {
                Ok(Some(line)) => record_line(line, options.echo, &mut sink).await,
                Ok(None) => {
                    debug!(role = %role, "Monitored stream closed, waiting for exit");
                    break tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => MonitorExit::Interrupted,
                        status = supervisor.wait_for(role) => {
                            MonitorExit::ProcessExited(status.and_then(|s| s.code()))
                        }
                    };
                }
                Err(e) => break MonitorExit::StreamError(e),
            },

            status = supervisor.wait_for(role) => {
                // Output written just before exit may still sit in the pipe.
                let rest = async {
                    while let Ok(Some(line)) = read_segment(&mut reader, &mut partial).await {
                        record_line(line, options.echo, &mut sink).await;
                    }
                };
                if timeout(DRAIN_TIMEOUT, rest).await.is_err() {
                    debug!(role = %role, "Monitored stream still open after exit");
                }
                break MonitorExit::ProcessExited(status.and_then(|s| s.code()));
            }
        }
    };

    if let Some(mut file) = sink {
        if let Err(e) = file.flush().await {
            debug!(error = %e, "Failed to flush monitor log");
        }
    }
    info!(role = %role, reason = %exit, "Monitor loop ended");
    exit
}

/// Echoes one monitored line and appends it to the sink.
///
/// A failed write disables the sink for the rest of the session.
async fn record_line(line: String, echo: bool, sink: &mut Option<tokio::fs::File>) {
    if line.is_empty() {
        return;
    }
    if echo {
        println!("{line}");
    }
    if let Some(file) = sink.as_mut() {
        let mut record = line.into_bytes();
        record.push(b'\n');
        if let Err(e) = file.write_all(&record).await {
            warn!(error = %e, "Failed to write monitor log, disabling");
            *sink = None;
        }
    }
}

/// Reads up to the next `\n` or `\r`.
///
/// Cancel safe: bytes of an unfinished segment stay in `partial`.
async fn read_segment<R>(reader: &mut R, partial: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if partial.is_empty() {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(partial).into_owned();
            partial.clear();
            return Ok(Some(line));
        }

        if let Some(pos) = available.iter().position(|b| matches!(b, b'\n' | b'\r')) {
            partial.extend_from_slice(&available[..pos]);
            reader.consume(pos + 1);
            let line = String::from_utf8_lossy(partial).into_owned();
            partial.clear();
            return Ok(Some(line));
        }

        let len = available.len();
        partial.extend_from_slice(available);
        reader.consume(len);
    }
}
