//! Application service — file transfer over the scp protocol.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//!
//! Pushing drives a remote `scp -t` sink; every directory level is streamed
//! in its own sink session rooted at that directory. Pulling drives a remote
//! `scp -f` source with [`receive`] acting as the sink.

use std::any::Any;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::ports::TransportSession;
use crate::domain::error::TransferError;
use crate::domain::remote::{ControlLine, path_components, shell_quote};

/// Copy program started on the remote host.
pub const SCP_PROGRAM: &str = "scp";

const DIR_MODE: u32 = 0o755;

/// Totals of one transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Transferred {
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
}

// ── Push ──────────────────────────────────────────────────────────────────────

/// Copy `local` to the directory `remote`, creating it first.
///
/// A file lands inside `remote` under its local name; `remote` never names
/// the file itself. A directory has its contents copied into `remote`, which
/// takes the local directory's mode. Traversal is depth-first with files
/// before subdirectories.
///
/// # Errors
///
/// Returns [`TransferError::Remote`] when the sink reports an error, and
/// I/O or protocol errors otherwise. The transfer stops at the first error.
pub async fn copy_to(
    transport: &impl TransportSession,
    local: &Path,
    remote: &str,
) -> Result<Transferred, TransferError> {
    let target = remote.trim();
    let root = fs::metadata(local).await?;
    let root_mode = if root.is_dir() {
        mode_of(&root, DIR_MODE)
    } else {
        DIR_MODE
    };
    ensure_remote_dir(transport, target, root_mode).await?;

    let mut totals = Transferred::default();
    let mut queue = vec![(local.to_path_buf(), target.to_string())];
    while let Some((src, dst)) = queue.pop() {
        let meta = fs::metadata(&src).await?;
        let mut sink = SinkSession::open(transport, &dst).await?;
        if meta.is_file() {
            sink.send_file(&src, &meta, &mut totals).await?;
            sink.finish().await;
            continue;
        }
        if !meta.is_dir() {
            return Err(TransferError::UnsupportedFileType(src.display().to_string()));
        }

        let (files, dirs) = list_children(&src).await?;
        for (path, meta) in &files {
            sink.send_file(path, meta, &mut totals).await?;
        }
        // Subdirectories are announced empty here and filled by their own session.
        for (path, meta) in &dirs {
            let name = file_name(path)?;
            sink.command(&ControlLine::Dir {
                mode: mode_of(meta, DIR_MODE),
                name,
            })
            .await?;
            sink.command(&ControlLine::End).await?;
            totals.dirs += 1;
        }
        sink.finish().await;

        for (path, _) in dirs.into_iter().rev() {
            let name = file_name(&path)?;
            queue.push((path, join_remote(&dst, &name)));
        }
    }
    Ok(totals)
}

/// Create `target` on the remote side, one directory level at a time. The
/// last level gets `leaf_mode`.
async fn ensure_remote_dir(
    transport: &impl TransportSession,
    target: &str,
    leaf_mode: u32,
) -> Result<(), TransferError> {
    let components = path_components(target);
    if components.is_empty() {
        return Ok(());
    }
    let base = if target.starts_with('/') { "/" } else { "." };
    let mut sink = SinkSession::open(transport, base).await?;
    let last = components.len() - 1;
    for (i, name) in components.iter().enumerate() {
        sink.command(&ControlLine::Dir {
            mode: if i == last { leaf_mode } else { DIR_MODE },
            name: (*name).to_string(),
        })
        .await?;
    }
    for _ in &components {
        sink.command(&ControlLine::End).await?;
    }
    sink.finish().await;
    Ok(())
}

/// One `scp -t` process on the remote side.
struct SinkSession {
    stdin: Box<dyn AsyncWrite + Send + Unpin>,
    stdout: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    stderr: JoinHandle<()>,
    _guard: Box<dyn Any + Send>,
}

impl SinkSession {
    async fn open(transport: &impl TransportSession, dir: &str) -> Result<Self, TransferError> {
        let command = format!("{SCP_PROGRAM} -tr {}", shell_quote(dir));
        debug!(%command, "opening copy sink");
        let process = transport
            .spawn(&command)
            .await
            .map_err(|e| TransferError::Spawn(format!("{e:#}")))?;
        let stderr = tokio::spawn(log_stderr(process.stderr));
        let mut session = Self {
            stdin: process.stdin,
            stdout: BufReader::new(process.stdout),
            stderr,
            _guard: process.guard,
        };
        read_ack(&mut session.stdout).await?;
        Ok(session)
    }

    async fn command(&mut self, control: &ControlLine) -> Result<(), TransferError> {
        let line = control.encode();
        debug!(%line, "scp control");
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        read_ack(&mut self.stdout).await
    }

    async fn send_file(
        &mut self,
        path: &Path,
        meta: &std::fs::Metadata,
        totals: &mut Transferred,
    ) -> Result<(), TransferError> {
        let size = meta.len();
        self.command(&ControlLine::File {
            mode: mode_of(meta, 0o644),
            size,
            name: file_name(path)?,
        })
        .await?;
        let file = fs::File::open(path).await?;
        let sent = tokio::io::copy(&mut file.take(size), &mut self.stdin).await?;
        if sent != size {
            return Err(TransferError::Protocol(format!(
                "{} shrank from {size} to {sent} bytes while sending",
                path.display()
            )));
        }
        self.stdin.write_all(&[0]).await?;
        self.stdin.flush().await?;
        read_ack(&mut self.stdout).await?;
        totals.files += 1;
        totals.bytes += size;
        Ok(())
    }

    /// Close the sink's input and let it exit.
    async fn finish(mut self) {
        let _ = self.stdin.shutdown().await;
        drop(self.stdin);
        let _ = self.stderr.await;
    }
}

async fn log_stderr(stderr: Box<dyn AsyncRead + Send + Unpin>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(%line, "scp stderr");
    }
}

// ── Pull ──────────────────────────────────────────────────────────────────────

/// Copy `remote` (file or directory, recursively) to `local`.
///
/// If `local` is an existing directory the copy lands inside it, otherwise
/// it is created under that name.
///
/// # Errors
///
/// Returns [`TransferError::Remote`] when the source reports an error, and
/// I/O or protocol errors otherwise.
pub async fn copy_from(
    transport: &impl TransportSession,
    remote: &str,
    local: &Path,
) -> Result<Transferred, TransferError> {
    let command = format!("{SCP_PROGRAM} -rf {}", shell_quote(remote.trim()));
    debug!(%command, "opening copy source");
    let process = transport
        .spawn(&command)
        .await
        .map_err(|e| TransferError::Spawn(format!("{e:#}")))?;
    let stderr = tokio::spawn(log_stderr(process.stderr));
    let result = receive(process.stdout, process.stdin, local).await;
    drop(process.guard);
    let _ = stderr.await;
    result
}

/// Act as an scp sink: read control lines and data from `input` and
/// acknowledge on `output`, materialising everything under `target`.
///
/// # Errors
///
/// Returns [`TransferError::Remote`] for errors reported by the source,
/// [`TransferError::Protocol`] for malformed or unbalanced control lines, and
/// I/O errors.
pub async fn receive<R, W>(input: R, mut output: W, target: &Path) -> Result<Transferred, TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut input = BufReader::new(input);
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut totals = Transferred::default();
    let mut line = Vec::new();

    ack(&mut output).await?;
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if matches!(line.first(), Some(1 | 2)) {
            let message = String::from_utf8_lossy(&line[1..]).trim_end().to_string();
            return Err(TransferError::Remote(message));
        }
        let text = String::from_utf8_lossy(&line);
        let control = ControlLine::parse(text.trim_end_matches(['\n', '\r']))?;
        debug!(?control, "scp control received");
        match control {
            ControlLine::File { mode, size, name } => {
                let path = placement(target, &dirs, &name).await;
                ack(&mut output).await?;
                let mut file = fs::File::create(&path).await?;
                let written = tokio::io::copy(&mut (&mut input).take(size), &mut file).await?;
                if written != size {
                    return Err(TransferError::Protocol(format!(
                        "{name}: expected {size} bytes, got {written}"
                    )));
                }
                file.flush().await?;
                match input.read_u8().await? {
                    0 => {}
                    other => return Err(TransferError::UnexpectedResponse(other)),
                }
                set_mode(&path, mode).await?;
                ack(&mut output).await?;
                totals.files += 1;
                totals.bytes += size;
            }
            ControlLine::Dir { mode, name } => {
                let path = placement(target, &dirs, &name).await;
                fs::create_dir_all(&path).await?;
                set_mode(&path, mode).await?;
                dirs.push(path);
                ack(&mut output).await?;
                totals.dirs += 1;
            }
            ControlLine::End => {
                if dirs.pop().is_none() {
                    return Err(TransferError::Protocol("E without matching D".to_string()));
                }
                ack(&mut output).await?;
            }
            ControlLine::Times => ack(&mut output).await?,
        }
    }
    if !dirs.is_empty() {
        return Err(TransferError::Protocol(format!(
            "stream ended inside {} open directories",
            dirs.len()
        )));
    }
    Ok(totals)
}

/// Where an entry called `name` goes.
async fn placement(target: &Path, dirs: &[PathBuf], name: &str) -> PathBuf {
    match dirs.last() {
        Some(dir) => dir.join(name),
        None if fs::metadata(target).await.is_ok_and(|m| m.is_dir()) => target.join(name),
        None => target.to_path_buf(),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn ack<W: AsyncWrite + Unpin>(output: &mut W) -> Result<(), TransferError> {
    output.write_all(&[0]).await?;
    output.flush().await?;
    Ok(())
}

/// Read one response byte from a sink; `1` and `2` carry a message line.
async fn read_ack<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<(), TransferError> {
    match reader.read_u8().await? {
        0 => Ok(()),
        1 | 2 => {
            let mut message = String::new();
            reader.read_line(&mut message).await?;
            Err(TransferError::Remote(message.trim_end().to_string()))
        }
        other => Err(TransferError::UnexpectedResponse(other)),
    }
}

/// Regular files and directories directly under `dir`, sorted by name.
async fn list_children(
    dir: &Path,
) -> Result<(Vec<(PathBuf, std::fs::Metadata)>, Vec<(PathBuf, std::fs::Metadata)>), TransferError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let meta = fs::metadata(&path).await?;
        if meta.is_file() {
            files.push((path, meta));
        } else if meta.is_dir() {
            dirs.push((path, meta));
        } else {
            return Err(TransferError::UnsupportedFileType(path.display().to_string()));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok((files, dirs))
}

fn file_name(path: &Path) -> Result<String, TransferError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TransferError::UnsupportedFileType(path.display().to_string()))
}

fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(unix)]
fn mode_of(meta: &std::fs::Metadata, _fallback: u32) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_meta: &std::fs::Metadata, fallback: u32) -> u32 {
    fallback
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), TransferError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), TransferError> {
    Ok(())
}
