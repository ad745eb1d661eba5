//! Application service — command channel over one interactive shell.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//!
//! The shell gives no framing of its own. After each command the channel
//! echoes a per-invocation sentinel to stdout and to stderr; a reader task
//! per stream turns bytes into lines and signals end-of-command when it sees
//! the sentinel it was told to expect. A command is complete once both
//! streams have signalled.

use std::any::Any;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::application::ports::{ProgressReporter, TransportSession};
use crate::domain::error::ShellError;
use crate::domain::remote::{OutputLine, OutputStream, SentinelMatch, match_sentinel, sentinel};

/// Shell started on the remote host.
pub const SHELL_PROGRAM: &str = "/bin/bash";

/// Lines buffered per stream before a reader waits for the consumer.
const QUEUE_DEPTH: usize = 256;

#[derive(Debug)]
enum ReaderEvent {
    Line(String),
    End,
    Failed(String),
    Closed,
}

struct StreamReader {
    stream: OutputStream,
    events: mpsc::Receiver<ReaderEvent>,
    expect: mpsc::UnboundedSender<String>,
    /// A command was written whose end marker has not been consumed yet.
    pending: bool,
    task: JoinHandle<()>,
}

impl StreamReader {
    fn spawn(stream: OutputStream, source: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        let (event_tx, events) = mpsc::channel(QUEUE_DEPTH);
        let (expect, expect_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_lines(stream, source, expect_rx, event_tx));
        Self {
            stream,
            events,
            expect,
            pending: false,
            task,
        }
    }

    /// Consume events until the outstanding command's end marker.
    async fn drain(&mut self) -> Option<ShellError> {
        while self.pending {
            match self.events.recv().await {
                Some(ReaderEvent::Line(_)) => {}
                Some(ReaderEvent::End) => self.pending = false,
                other => return Some(self.finish_with(other)),
            }
        }
        None
    }

    /// Mark the stream done after a failure event; returns the error to report.
    fn finish_with(&mut self, event: Option<ReaderEvent>) -> ShellError {
        self.pending = false;
        match event {
            Some(ReaderEvent::Failed(message)) => ShellError::Reader {
                stream: self.stream.as_str(),
                message,
            },
            _ => ShellError::Closed {
                stream: self.stream.as_str(),
            },
        }
    }
}

/// An interactive shell on the remote host that runs commands one at a time.
///
/// Opened once per batch of commands and closed explicitly; a closed shell
/// is never reused.
pub struct RemoteShell {
    stdin: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    stdout: StreamReader,
    stderr: StreamReader,
    seq: u64,
    _guard: Box<dyn Any + Send>,
}

impl std::fmt::Debug for RemoteShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteShell")
            .field("seq", &self.seq)
            .field("closed", &self.stdin.is_none())
            .finish_non_exhaustive()
    }
}

impl RemoteShell {
    /// Start [`SHELL_PROGRAM`] over `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the shell process cannot be started.
    pub async fn open(transport: &impl TransportSession) -> Result<Self> {
        Self::open_program(transport, SHELL_PROGRAM).await
    }

    /// Start an arbitrary POSIX shell over `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the shell process cannot be started.
    pub async fn open_program(transport: &impl TransportSession, program: &str) -> Result<Self> {
        let process = transport
            .spawn(program)
            .await
            .with_context(|| format!("starting remote shell '{program}'"))?;
        debug!(program, "remote shell started");
        Ok(Self {
            stdin: Some(process.stdin),
            stdout: StreamReader::spawn(OutputStream::Stdout, process.stdout),
            stderr: StreamReader::spawn(OutputStream::Stderr, process.stderr),
            seq: 0,
            _guard: process.guard,
        })
    }

    /// Submit `command` and return a handle to its live output.
    ///
    /// Output of a previous command that was not read to completion is
    /// discarded first.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyClosed`] after [`close`](Self::close), a
    /// reader failure left over from the previous command, or
    /// [`ShellError::Write`] if the command cannot be written.
    pub async fn run(&mut self, command: &str) -> Result<CommandRun<'_>, ShellError> {
        if self.stdin.is_none() {
            return Err(ShellError::AlreadyClosed);
        }
        if let Some(e) = self.stdout.drain().await {
            return Err(e);
        }
        if let Some(e) = self.stderr.drain().await {
            return Err(e);
        }

        self.seq += 1;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let marker = sentinel(self.seq, nanos);
        // Readers must know the marker before it can possibly arrive.
        let registered = self.stdout.expect.send(marker.clone()).is_ok()
            && self.stderr.expect.send(marker.clone()).is_ok();
        if !registered {
            return Err(ShellError::Closed { stream: "stdout" });
        }

        let script = format!("{command}\necho '{marker}'\necho '{marker}' >&2\n");
        trace!(seq = self.seq, command, "submitting command");
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ShellError::AlreadyClosed);
        };
        if let Err(e) = write_all(stdin, script.as_bytes()).await {
            self.stdin = None;
            return Err(ShellError::Write(e));
        }
        self.stdout.pending = true;
        self.stderr.pending = true;
        Ok(CommandRun {
            shell: self,
            failure: None,
        })
    }

    /// Run `command` and collect both streams.
    ///
    /// # Errors
    ///
    /// Returns the submission error or the first stream failure.
    pub async fn run_collect(&mut self, command: &str) -> Result<Vec<OutputLine>, ShellError> {
        let mut run = self.run(command).await?;
        let mut lines = Vec::new();
        while let Some(line) = run.next_line().await {
            lines.push(line);
        }
        run.wait().await?;
        Ok(lines)
    }

    /// Whether [`close`](Self::close) has run or the input side failed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.stdin.is_none()
    }

    /// Ask the shell to exit and wait for both readers to reach end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyClosed`] on a second call.
    pub async fn close(&mut self) -> Result<(), ShellError> {
        let Some(mut stdin) = self.stdin.take() else {
            return Err(ShellError::AlreadyClosed);
        };
        // The shell may already be gone; closing is best effort from here on.
        let _ = write_all(&mut stdin, b"exit\n").await;
        let _ = stdin.shutdown().await;
        drop(stdin);
        for reader in [&mut self.stdout, &mut self.stderr] {
            reader.pending = false;
            while let Some(event) = reader.events.recv().await {
                if matches!(event, ReaderEvent::Closed | ReaderEvent::Failed(_)) {
                    break;
                }
            }
        }
        debug!(commands = self.seq, "remote shell closed");
        Ok(())
    }
}

impl Drop for RemoteShell {
    fn drop(&mut self) {
        self.stdout.task.abort();
        self.stderr.task.abort();
    }
}

/// Live output of one submitted command.
///
/// Holds the shell mutably, so the next command can only be submitted once
/// this one is dropped.
pub struct CommandRun<'a> {
    shell: &'a mut RemoteShell,
    failure: Option<ShellError>,
}

impl CommandRun<'_> {
    /// The next output line from either stream, or `None` once both streams
    /// have completed.
    ///
    /// Order is preserved within a stream, not across streams.
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        loop {
            let shell = &mut *self.shell;
            let (out, err) = (&mut shell.stdout, &mut shell.stderr);
            let (out_open, err_open) = (out.pending, err.pending);
            if !out_open && !err_open {
                return None;
            }
            let (stream, event) = tokio::select! {
                ev = out.events.recv(), if out_open => (OutputStream::Stdout, ev),
                ev = err.events.recv(), if err_open => (OutputStream::Stderr, ev),
            };
            let reader = match stream {
                OutputStream::Stdout => &mut shell.stdout,
                OutputStream::Stderr => &mut shell.stderr,
            };
            match event {
                Some(ReaderEvent::Line(text)) => {
                    return Some(OutputLine {
                        stream: reader.stream,
                        text,
                    });
                }
                Some(ReaderEvent::End) => reader.pending = false,
                other => {
                    let e = reader.finish_with(other);
                    self.failure.get_or_insert(e);
                }
            }
        }
    }

    /// Drain remaining output and report how the command's streams ended.
    ///
    /// # Errors
    ///
    /// Returns the first reader failure or early end of stream.
    pub async fn wait(mut self) -> Result<(), ShellError> {
        while self.next_line().await.is_some() {}
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Run `commands` in order on one shell, forwarding output to `reporter`.
///
/// Stops at the first command whose streams fail; commands are not checked
/// for exit status.
///
/// # Errors
///
/// Returns the first channel failure.
pub async fn run_batch(
    shell: &mut RemoteShell,
    reporter: &impl ProgressReporter,
    commands: &[String],
) -> Result<(), ShellError> {
    for command in commands {
        reporter.step(&format!("running: {}", summarize(command)));
        let mut run = shell.run(command).await?;
        while let Some(line) = run.next_line().await {
            reporter.remote_output(&line);
        }
        run.wait().await?;
    }
    Ok(())
}

fn summarize(command: &str) -> String {
    let first = command.trim().lines().next().unwrap_or_default();
    if first.len() > 60 || command.trim().lines().count() > 1 {
        let cut: String = first.chars().take(57).collect();
        format!("{cut}...")
    } else {
        first.to_string()
    }
}

async fn write_all<W>(stdin: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    stdin.write_all(bytes).await?;
    stdin.flush().await
}

async fn read_lines(
    stream: OutputStream,
    source: Box<dyn AsyncRead + Send + Unpin>,
    mut expect: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<ReaderEvent>,
) {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    loop {
        buf.clear();
        let event = match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                let _ = events.send(ReaderEvent::Closed).await;
                return;
            }
            Ok(_) => decode_line(&buf),
            Err(e) => {
                let _ = events.send(ReaderEvent::Failed(e.to_string())).await;
                return;
            }
        };
        if current.is_none() {
            current = expect.try_recv().ok();
        }
        let matched = current
            .as_deref()
            .map_or(SentinelMatch::Output, |marker| match_sentinel(&event, marker));
        let sent = match matched {
            SentinelMatch::Output => events.send(ReaderEvent::Line(event)).await,
            SentinelMatch::Exact => {
                current = None;
                events.send(ReaderEvent::End).await
            }
            SentinelMatch::Trailing(prefix) => {
                let prefix = prefix.to_string();
                current = None;
                match events.send(ReaderEvent::Line(prefix)).await {
                    Ok(()) => events.send(ReaderEvent::End).await,
                    Err(e) => Err(e),
                }
            }
        };
        if sent.is_err() {
            trace!(%stream, "shell dropped, reader exiting");
            return;
        }
    }
}

fn decode_line(buf: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(buf).into_owned();
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
