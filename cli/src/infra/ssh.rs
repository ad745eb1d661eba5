//! SSH implementation of the `Connector`, `TransportSession` and `Forwarder`
//! ports.
//!
//! Built on `russh`. Every spawned process gets its own session channel; a
//! pump task moves bytes between the channel and in-memory pipes so callers
//! see plain `AsyncRead`/`AsyncWrite` streams. Host keys are not verified:
//! the hosts are freshly created instances whose keys cannot be known ahead
//! of time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::application::ports::{ByteStream, Connector, Forwarder, RemoteProcess, TransportSession};
use crate::domain::error::TransportError;

/// Pause between connection attempts.
pub const DIAL_RETRY: Duration = Duration::from_secs(1);

const PIPE_CAPACITY: usize = 64 * 1024;

/// How to log in.
#[derive(Clone)]
pub enum SshAuth {
    Password(String),
    PrivateKey(PathBuf),
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::PrivateKey(path) => f.debug_tuple("PrivateKey").field(path).finish(),
        }
    }
}

/// Dials hosts over SSH, retrying until a deadline.
#[derive(Debug, Clone)]
pub struct SshConnector {
    user: String,
    port: u16,
    auth: SshAuth,
    timeout: Duration,
}

impl SshConnector {
    #[must_use]
    pub fn new(user: impl Into<String>, port: u16, auth: SshAuth, timeout: Duration) -> Self {
        Self {
            user: user.into(),
            port,
            auth,
            timeout,
        }
    }

    async fn dial(&self, config: Arc<client::Config>, host: &str) -> Result<Handle<AcceptAnyHostKey>> {
        client::connect(config, (host, self.port), AcceptAnyHostKey)
            .await
            .with_context(|| format!("connecting to {host}:{}", self.port))
    }

    async fn authenticate(&self, handle: &mut Handle<AcceptAnyHostKey>, host: &str) -> Result<()> {
        let accepted = match &self.auth {
            SshAuth::Password(password) => handle
                .authenticate_password(self.user.as_str(), password.as_str())
                .await
                .context("password authentication")?,
            SshAuth::PrivateKey(path) => {
                let key = russh_keys::load_secret_key(path, None)
                    .with_context(|| format!("cannot load private key {}", path.display()))?;
                handle
                    .authenticate_publickey(self.user.as_str(), Arc::new(key))
                    .await
                    .context("public key authentication")?
            }
        };
        if !accepted {
            return Err(TransportError::Rejected {
                user: self.user.clone(),
                host: host.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, host: &str) -> Result<SshSession> {
        let config = Arc::new(client::Config::default());
        let deadline = Instant::now() + self.timeout;
        let mut attempts = 0u32;
        let mut handle = loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let last_error = match tokio::time::timeout(remaining, self.dial(config.clone(), host)).await {
                Ok(Ok(handle)) => break handle,
                Ok(Err(e)) => format!("{e:#}"),
                Err(_) => "connection attempt timed out".to_string(),
            };
            debug!(host, attempts, error = %last_error, "ssh dial failed");
            if Instant::now() + DIAL_RETRY >= deadline {
                return Err(TransportError::Dial {
                    host: host.to_string(),
                    after: self.timeout,
                    last_error,
                }
                .into());
            }
            tokio::time::sleep(DIAL_RETRY).await;
        };
        self.authenticate(&mut handle, host).await?;
        debug!(host, user = %self.user, attempts, "ssh session established");
        Ok(SshSession {
            handle: Arc::new(handle),
            host: host.to_string(),
        })
    }
}

/// Accepts whatever key the server presents.
pub struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// An authenticated SSH connection.
#[derive(Clone)]
pub struct SshSession {
    handle: Arc<Handle<AcceptAnyHostKey>>,
    host: String,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl TransportSession for SshSession {
    async fn spawn(&self, command: &str) -> Result<RemoteProcess> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .with_context(|| format!("opening session channel on {}", self.host))?;
        channel
            .exec(true, command)
            .await
            .with_context(|| format!("starting '{command}' on {}", self.host))?;

        let (stdin, stdin_pump) = tokio::io::duplex(PIPE_CAPACITY);
        let (stdout_pump, stdout) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_pump, stderr) = tokio::io::duplex(PIPE_CAPACITY);
        let task = tokio::spawn(pump(channel, stdin_pump, stdout_pump, stderr_pump));
        Ok(RemoteProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            guard: Box::new(AbortOnDrop(task)),
        })
    }
}

impl Forwarder for SshSession {
    async fn forward(&self, host: &str, port: u16) -> Result<Box<dyn ByteStream>> {
        let channel = self
            .handle
            .channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await
            .with_context(|| format!("forwarding to {host}:{port} through {}", self.host))?;
        debug!(host, port, via = %self.host, "forward opened");
        let (local, far) = tokio::io::duplex(PIPE_CAPACITY);
        tokio::spawn(pump_stream(channel, far));
        Ok(Box::new(local))
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Move bytes between the channel and the caller's pipes until the channel
/// closes. Dropping the output pipes on exit signals end of stream.
async fn pump(
    mut channel: Channel<Msg>,
    mut stdin: DuplexStream,
    mut stdout: DuplexStream,
    mut stderr: DuplexStream,
) {
    let mut buf = vec![0u8; 32 * 1024];
    let mut stdin_open = true;
    loop {
        tokio::select! {
            read = stdin.read(&mut buf), if stdin_open => match read {
                Ok(0) | Err(_) => {
                    stdin_open = false;
                    let _ = channel.eof().await;
                }
                Ok(n) => {
                    if channel.data(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            },
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    let _ = stdout.write_all(&data).await;
                }
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                    let _ = stderr.write_all(&data).await;
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    trace!(exit_status, "remote process exited");
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },
        }
    }
    let _ = stdout.shutdown().await;
    let _ = stderr.shutdown().await;
}

/// Move bytes between a forwarded channel and the caller's end of `far`
/// until either side closes.
async fn pump_stream(mut channel: Channel<Msg>, far: DuplexStream) {
    let (mut reader, mut writer) = tokio::io::split(far);
    let mut buf = vec![0u8; 32 * 1024];
    let mut local_open = true;
    loop {
        tokio::select! {
            read = reader.read(&mut buf), if local_open => match read {
                Ok(0) | Err(_) => {
                    local_open = false;
                    let _ = channel.eof().await;
                }
                Ok(n) => {
                    if channel.data(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            },
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    if writer.write_all(&data).await.is_err() {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    let _ = writer.shutdown().await;
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },
        }
    }
    let _ = writer.shutdown().await;
}
