//! Application service — local SOCKS5 proxy whose connections leave from the
//! remote host.
//!
//! Handshakes run on their own tasks. Forwards are opened one at a time on
//! the serving task because a `Forwarder` future need not be `Send`; once
//! open, each connection is copied on its own task.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::ports::{Forwarder, ProgressReporter};
use crate::domain::error::SocksError;
use crate::domain::socks::{self, Parse, Reply, Target};

/// Longest SOCKS message: a `CONNECT` carrying a 255-byte host name.
const MAX_MESSAGE: usize = 262;

/// A client that has not finished its handshake by then is dropped.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection counts for one proxy run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProxyStats {
    pub accepted: usize,
    pub forwarded: usize,
    /// Failed handshakes plus targets the remote side could not reach.
    pub refused: usize,
}

/// Serve SOCKS5 clients on `listener` until `shutdown` resolves, opening
/// every requested connection through `forwarder`.
///
/// # Errors
///
/// Returns an error if the listener has no local address.
pub async fn serve(
    listener: TcpListener,
    forwarder: &impl Forwarder,
    reporter: &impl ProgressReporter,
    shutdown: impl Future<Output = ()>,
) -> Result<ProxyStats> {
    let addr = listener
        .local_addr()
        .context("proxy listener has no local address")?;
    reporter.success(&format!("SOCKS5 proxy listening on {addr}"));

    let (ready_tx, mut ready_rx) = mpsc::channel::<Option<(TcpStream, Target)>>(16);
    let mut stats = ProxyStats::default();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    stats.accepted += 1;
                    let tx = ready_tx.clone();
                    tokio::spawn(async move {
                        let mut stream = stream;
                        let handshake = negotiate(&mut stream);
                        let ready = match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
                            Ok(Ok(target)) => Some((stream, target)),
                            Ok(Err(e)) => {
                                debug!(%peer, error = %format!("{e:#}"), "socks handshake failed");
                                None
                            }
                            Err(_) => {
                                debug!(%peer, "socks handshake timed out");
                                None
                            }
                        };
                        let _ = tx.send(ready).await;
                    });
                }
                Err(e) => warn!(error = %e, "accepting proxy client failed"),
            },
            Some(ready) = ready_rx.recv() => {
                let opened = match ready {
                    Some((client, target)) => open(forwarder, client, &target).await,
                    None => false,
                };
                if opened {
                    stats.forwarded += 1;
                } else {
                    stats.refused += 1;
                }
            }
        }
    }
    debug!(?stats, "proxy stopped");
    Ok(stats)
}

/// Open `target` through `forwarder`, answer the client, and start copying.
async fn open(forwarder: &impl Forwarder, mut client: TcpStream, target: &Target) -> bool {
    let mut remote = match forwarder.forward(&target.host, target.port).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!(%target, error = %format!("{e:#}"), "forward failed");
            let _ = client.write_all(&Reply::HostUnreachable.encode()).await;
            return false;
        }
    };
    if client.write_all(&Reply::Succeeded.encode()).await.is_err() {
        return false;
    }
    debug!(%target, "forwarding");
    let target = target.clone();
    tokio::spawn(async move {
        match tokio::io::copy_bidirectional(&mut client, &mut remote).await {
            Ok((up, down)) => debug!(%target, up, down, "connection closed"),
            Err(e) => debug!(%target, error = %e, "connection broke"),
        }
    });
    true
}

/// Run the server side of a no-auth SOCKS5 handshake and return the
/// `CONNECT` target. The success reply is left to the caller; rejections
/// are answered here.
///
/// # Errors
///
/// Returns an error if the client closes early or speaks anything other than
/// no-auth SOCKS5 `CONNECT`.
pub async fn negotiate<S>(stream: &mut S) -> Result<Target>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(MAX_MESSAGE);
    if let Err(e) = read_message(stream, &mut buf, socks::parse_greeting).await {
        if matches!(
            e.downcast_ref::<SocksError>(),
            Some(SocksError::NoAcceptableMethod)
        ) {
            let _ = stream.write_all(&socks::method_selection(false)).await;
        }
        return Err(e);
    }
    stream
        .write_all(&socks::method_selection(true))
        .await
        .context("answering proxy client")?;

    match read_message(stream, &mut buf, socks::parse_request).await {
        Ok(target) => Ok(target),
        Err(e) => {
            if let Some(err) = e.downcast_ref::<SocksError>() {
                let _ = stream.write_all(&Reply::for_error(err).encode()).await;
            }
            Err(e)
        }
    }
}

/// Read until `parse` accepts a whole message; leftover bytes stay in `buf`.
async fn read_message<S, T>(
    stream: &mut S,
    buf: &mut Vec<u8>,
    parse: impl Fn(&[u8]) -> Result<Parse<T>, SocksError>,
) -> Result<T>
where
    S: AsyncRead + Unpin,
{
    let mut chunk = [0u8; MAX_MESSAGE];
    loop {
        if let Parse::Done(msg, used) = parse(buf.as_slice())? {
            buf.drain(..used);
            return Ok(msg);
        }
        if buf.len() >= MAX_MESSAGE {
            return Err(SocksError::Malformed("message too long").into());
        }
        let n = stream
            .read(&mut chunk)
            .await
            .context("reading from proxy client")?;
        if n == 0 {
            bail!("proxy client closed during the handshake");
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
