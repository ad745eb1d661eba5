//! Copy protocol tests against an in-memory scp peer.
//!
//! `ScpLoopback` plays the remote side: `scp -tr <dir>` is served by the
//! crate's own sink and `scp -rf <path>` by a small source below, both
//! rooted at a temporary directory standing in for the remote filesystem.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::any::Any;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use ecsup::application::ports::{RemoteProcess, TransportSession};
use ecsup::application::services::transfer::{Transferred, copy_from, copy_to, receive};
use ecsup::domain::TransferError;
use ecsup::domain::remote::ControlLine;
use tokio::io::AsyncWriteExt;

const PIPE: usize = 64 * 1024;

struct ScpLoopback {
    root: PathBuf,
    /// Sinks for paths under this prefix refuse to start.
    locked: Option<String>,
}

impl ScpLoopback {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            locked: None,
        }
    }

    fn resolve(&self, remote: &str) -> PathBuf {
        self.root.join(remote.trim_start_matches('/'))
    }
}

fn unquote(arg: &str) -> String {
    match arg.strip_prefix('\'').and_then(|a| a.strip_suffix('\'')) {
        Some(inner) => inner.replace("'\\''", "'"),
        None => arg.to_string(),
    }
}

impl TransportSession for ScpLoopback {
    async fn spawn(&self, command: &str) -> Result<RemoteProcess> {
        let (stdin, remote_in) = tokio::io::duplex(PIPE);
        let (mut remote_out, stdout) = tokio::io::duplex(PIPE);
        let mut guard: Box<dyn Any + Send> = Box::new(());

        if let Some(dir) = command.strip_prefix("scp -tr ") {
            let dir = unquote(dir);
            if self.locked.as_deref().is_some_and(|l| dir.starts_with(l)) {
                remote_out
                    .write_all(format!("\x01scp: {dir}: Permission denied\n").as_bytes())
                    .await?;
                drop(remote_out);
            } else {
                let target = self.resolve(&dir);
                tokio::spawn(async move { receive(remote_in, remote_out, &target).await });
            }
        } else if let Some(path) = command.strip_prefix("scp -rf ") {
            let stream = source_stream(&self.resolve(&unquote(path)), &unquote(path));
            tokio::spawn(async move {
                let _ = remote_out.write_all(&stream).await;
                let _ = remote_out.shutdown().await;
            });
            // Acks are never read; the pipe only has to stay open.
            guard = Box::new(remote_in);
        } else {
            bail!("unexpected command {command}");
        }

        Ok(RemoteProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(tokio::io::empty()),
            guard,
        })
    }
}

/// Everything an scp source would send for `path`, acks ignored.
fn source_stream(path: &Path, shown: &str) -> Vec<u8> {
    let mut out = Vec::new();
    match fs::metadata(path) {
        Ok(_) => emit(path, &mut out),
        Err(_) => out.extend_from_slice(format!("\x01scp: {shown}: No such file or directory\n").as_bytes()),
    }
    out
}

fn emit(path: &Path, out: &mut Vec<u8>) {
    let meta = fs::metadata(path).expect("metadata");
    let name = path.file_name().expect("name").to_string_lossy().into_owned();
    let mode = meta.permissions().mode();
    if meta.is_dir() {
        out.extend_from_slice(ControlLine::Dir { mode, name }.encode().as_bytes());
        out.push(b'\n');
        let mut children: Vec<_> = fs::read_dir(path)
            .expect("read_dir")
            .map(|e| e.expect("entry").path())
            .collect();
        children.sort();
        for child in children {
            emit(&child, out);
        }
        out.extend_from_slice(b"E\n");
    } else {
        let body = fs::read(path).expect("read");
        let size = body.len() as u64;
        out.extend_from_slice(ControlLine::File { mode, size, name }.encode().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&body);
        out.push(0);
    }
}

fn write(path: &Path, body: &[u8], mode: u32) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, body).expect("write");
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod");
}

fn mode(path: &Path) -> u32 {
    fs::metadata(path).expect("metadata").permissions().mode() & 0o777
}

/// A small tree: two files at the top, one nested two levels down.
fn sample_tree(base: &Path) -> PathBuf {
    let src = base.join("project");
    write(&src.join("README.md"), b"# project\n", 0o644);
    write(&src.join("run.sh"), b"#!/bin/sh\necho hi\n", 0o755);
    write(&src.join("conf/app/secret.env"), b"TOKEN=abc", 0o600);
    write(&src.join("conf/empty.txt"), b"", 0o640);
    src
}

#[tokio::test]
async fn push_then_pull_round_trips_contents_and_modes() {
    let local = tempfile::tempdir().expect("tempdir");
    let remote = tempfile::tempdir().expect("tempdir");
    let src = sample_tree(local.path());
    let peer = ScpLoopback::new(remote.path());

    let pushed = copy_to(&peer, &src, "/opt/project").await.expect("push");

    assert_eq!(
        pushed,
        Transferred {
            files: 4,
            dirs: 2,
            bytes: 10 + 18 + 9
        }
    );
    let landed = remote.path().join("opt/project");
    assert_eq!(fs::read(landed.join("run.sh")).unwrap(), b"#!/bin/sh\necho hi\n");
    assert_eq!(mode(&landed.join("conf/app/secret.env")), 0o600);

    let back = local.path().join("restored");
    let pulled = copy_from(&peer, "/opt/project", &back).await.expect("pull");

    assert_eq!(pulled.files, 4);
    for (rel, m) in [
        ("README.md", 0o644),
        ("run.sh", 0o755),
        ("conf/app/secret.env", 0o600),
        ("conf/empty.txt", 0o640),
    ] {
        assert_eq!(fs::read(back.join(rel)).unwrap(), fs::read(src.join(rel)).unwrap(), "{rel}");
        assert_eq!(mode(&back.join(rel)), m, "{rel}");
    }
}

#[tokio::test]
async fn pushed_tree_root_keeps_its_mode() {
    let local = tempfile::tempdir().expect("tempdir");
    let remote = tempfile::tempdir().expect("tempdir");
    let src = sample_tree(local.path());
    fs::set_permissions(&src, fs::Permissions::from_mode(0o750)).expect("chmod");

    copy_to(&ScpLoopback::new(remote.path()), &src, "/opt/project")
        .await
        .expect("push");

    assert_eq!(mode(&remote.path().join("opt/project")), 0o750);
    assert_eq!(mode(&remote.path().join("opt")), 0o755);
}

#[tokio::test]
async fn pushed_file_lands_inside_the_remote_directory() {
    let local = tempfile::tempdir().expect("tempdir");
    let remote = tempfile::tempdir().expect("tempdir");
    let file = local.path().join("notes.txt");
    write(&file, b"remember", 0o644);

    let totals = copy_to(&ScpLoopback::new(remote.path()), &file, "data/in")
        .await
        .expect("push");

    assert_eq!(totals.files, 1);
    assert_eq!(fs::read(remote.path().join("data/in/notes.txt")).unwrap(), b"remember");
}

#[tokio::test]
async fn pull_into_existing_directory_nests_the_copy() {
    let local = tempfile::tempdir().expect("tempdir");
    let remote = tempfile::tempdir().expect("tempdir");
    write(&remote.path().join("srv/logs/app.log"), b"line\n", 0o644);
    let dest = local.path().join("downloads");
    fs::create_dir(&dest).expect("mkdir");

    copy_from(&ScpLoopback::new(remote.path()), "/srv/logs", &dest)
        .await
        .expect("pull");

    assert_eq!(fs::read(dest.join("logs/app.log")).unwrap(), b"line\n");
}

#[tokio::test]
async fn pull_of_missing_path_reports_remote_error() {
    let local = tempfile::tempdir().expect("tempdir");
    let remote = tempfile::tempdir().expect("tempdir");

    let err = copy_from(&ScpLoopback::new(remote.path()), "/nope", &local.path().join("x"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Remote(ref m) if m.contains("No such file")), "{err}");
}

#[tokio::test]
async fn refused_sink_stops_the_push() {
    let local = tempfile::tempdir().expect("tempdir");
    let remote = tempfile::tempdir().expect("tempdir");
    let src = sample_tree(local.path());
    let peer = ScpLoopback {
        locked: Some("/".to_string()),
        ..ScpLoopback::new(remote.path())
    };

    let err = copy_to(&peer, &src, "/opt/project").await.unwrap_err();

    assert!(matches!(err, TransferError::Remote(ref m) if m.contains("Permission denied")), "{err}");
    assert!(!remote.path().join("opt").exists());
}
