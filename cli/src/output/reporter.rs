//! `TerminalReporter` — Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly.

use std::cell::RefCell;

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::domain::{OutputLine, OutputStream};
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"  → {message}"` (suppressed when `ctx.quiet`)
/// - `success()` prints `"  ✓ {message}"` (suppressed when `ctx.quiet`)
/// - `warn()` prints `"  ! {message}"` (suppressed when `ctx.quiet`)
/// - `waiting()` drives a spinner on a TTY, otherwise prints each distinct
///   message once
/// - `remote_output()` always prints; stderr lines go to stderr
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    spinner: RefCell<Option<ProgressBar>>,
    last_waiting: RefCell<Option<String>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            spinner: RefCell::new(None),
            last_waiting: RefCell::new(None),
        }
    }

    /// Remove any active spinner before printing a regular line.
    fn settle(&self) {
        if let Some(pb) = self.spinner.borrow_mut().take() {
            progress::clear(&pb);
        }
        self.last_waiting.borrow_mut().take();
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        self.settle();
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.settle();
        if !self.ctx.quiet {
            println!("  {} {message}", "→".style(self.ctx.styles.header));
        }
    }

    fn success(&self, message: &str) {
        self.settle();
        if !self.ctx.quiet {
            println!("  {} {message}", "✓".style(self.ctx.styles.success));
        }
    }

    fn warn(&self, message: &str) {
        self.settle();
        if !self.ctx.quiet {
            println!("  {} {message}", "!".style(self.ctx.styles.warning));
        }
    }

    fn waiting(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        if self.last_waiting.borrow().as_deref() == Some(message) {
            return;
        }
        if self.ctx.show_progress() {
            let mut spinner = self.spinner.borrow_mut();
            match spinner.as_ref() {
                Some(pb) => pb.set_message(message.to_string()),
                None => *spinner = Some(progress::spinner(message)),
            }
        } else {
            println!("  {} {message}", "…".style(self.ctx.styles.dim));
        }
        *self.last_waiting.borrow_mut() = Some(message.to_string());
    }

    fn remote_output(&self, line: &OutputLine) {
        let print = || match line.stream {
            OutputStream::Stdout => println!("{}", line.text),
            OutputStream::Stderr => {
                eprintln!("{}", line.text.style(self.ctx.styles.remote_stderr));
            }
        };
        match self.spinner.borrow().as_ref() {
            Some(pb) => pb.suspend(print),
            None => print(),
        }
    }
}
