//! Infrastructure implementation of the `TransportSession` port for the
//! local host.
//!
//! `LocalTransport` runs commands through `sh -c` with piped stdio. The child
//! is killed when its guard is dropped, so an abandoned shell or copy process
//! never outlives its owner. Forwards are plain TCP connections from this
//! host.

use std::process::Stdio;

use anyhow::{Context, Result};

use crate::application::ports::{ByteStream, Forwarder, RemoteProcess, TransportSession};

/// Runs "remote" processes on this machine.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    shell: String,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl LocalTransport {
    /// Use `shell` (invoked as `<shell> -c <command>`) instead of `sh`.
    #[must_use]
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl TransportSession for LocalTransport {
    async fn spawn(&self, command: &str) -> Result<RemoteProcess> {
        let mut child = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {} -c {command}", self.shell))?;

        let stdin = child.stdin.take().context("child stdin was not piped")?;
        let stdout = child.stdout.take().context("child stdout was not piped")?;
        let stderr = child.stderr.take().context("child stderr was not piped")?;
        Ok(RemoteProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            guard: Box::new(child),
        })
    }
}

impl Forwarder for LocalTransport {
    async fn forward(&self, host: &str, port: u16) -> Result<Box<dyn ByteStream>> {
        let stream = tokio::net::TcpStream::connect((host, port))
            .await
            .with_context(|| format!("connecting to {host}:{port}"))?;
        Ok(Box::new(stream))
    }
}
