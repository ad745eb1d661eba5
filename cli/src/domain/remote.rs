//! Remote shell and copy protocol vocabulary.
//!
//! Completion sentinels for the command channel and scp control lines for
//! the transfer protocol. Pure functions only.

use std::fmt;

use super::error::TransferError;

/// One of the two output streams of a remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line of remote output, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

// ── Sentinels ───────────────────────────────────────────────────────────────

/// Build the end-of-command marker for one invocation.
///
/// `seq` is a per-shell counter and `nanos` a wall clock reading, so two
/// invocations never share a marker.
#[must_use]
pub fn sentinel(seq: u64, nanos: u128) -> String {
    format!("__ecsup_done_{seq}_{nanos}__")
}

/// How a line of output relates to the expected sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelMatch<'a> {
    /// Ordinary output.
    Output,
    /// The line is exactly the sentinel.
    Exact,
    /// Output without a trailing newline ran into the sentinel; the prefix is
    /// the command's last line.
    Trailing(&'a str),
}

#[must_use]
pub fn match_sentinel<'a>(line: &'a str, sentinel: &str) -> SentinelMatch<'a> {
    if line == sentinel {
        SentinelMatch::Exact
    } else if let Some(prefix) = line.strip_suffix(sentinel) {
        SentinelMatch::Trailing(prefix)
    } else {
        SentinelMatch::Output
    }
}

// ── scp control lines ───────────────────────────────────────────────────────

/// A control record of the scp protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlLine {
    /// `C<mode> <size> <name>`: a regular file follows.
    File { mode: u32, size: u64, name: String },
    /// `D<mode> 0 <name>`: enter a directory.
    Dir { mode: u32, name: String },
    /// `E`: leave the current directory.
    End,
    /// `T...`: modification times, accepted and ignored.
    Times,
}

impl ControlLine {
    /// Encode without the trailing newline.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::File { mode, size, name } => format!("C{:04o} {size} {name}", mode & 0o7777),
            Self::Dir { mode, name } => format!("D{:04o} 0 {name}", mode & 0o7777),
            Self::End => "E".to_string(),
            Self::Times => "T0 0 0 0".to_string(),
        }
    }

    /// Parse a control line received from a remote source.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Protocol`] for malformed lines and for names
    /// that would escape the target directory.
    pub fn parse(line: &str) -> Result<Self, TransferError> {
        let malformed = || TransferError::Protocol(line.to_string());
        let Some(kind) = line.chars().next() else {
            return Err(malformed());
        };
        match kind {
            'E' => Ok(Self::End),
            'T' => Ok(Self::Times),
            'C' | 'D' => {
                let mut parts = line[1..].splitn(3, ' ');
                let mode = parts
                    .next()
                    .and_then(|m| u32::from_str_radix(m, 8).ok())
                    .ok_or_else(malformed)?;
                let size = parts
                    .next()
                    .and_then(|s| s.parse::<u64>().ok())
                    .ok_or_else(malformed)?;
                let name = parts.next().ok_or_else(malformed)?;
                if name.is_empty() || name == "." || name == ".." || name.contains('/') {
                    return Err(malformed());
                }
                let name = name.to_string();
                Ok(if kind == 'C' {
                    Self::File { mode, size, name }
                } else {
                    Self::Dir { mode, name }
                })
            }
            _ => Err(malformed()),
        }
    }
}

/// Directory components a remote target path is made of.
#[must_use]
pub fn path_components(target: &str) -> Vec<&str> {
    target
        .split('/')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != ".")
        .collect()
}

/// Quote `arg` for a POSIX shell command line.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@%=,".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}
