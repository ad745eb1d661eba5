//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use crate::application::services::bootstrap::Provisioned;
use crate::application::services::transfer::Transferred;
use crate::domain::{DomainCheck, EcsConfig, Instance, RegisteredDomain};

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors =
            !no_color && is_tty && std::env::var_os("NO_COLOR").is_none_or(|v| v.is_empty());

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {:<24}{value}", key.style(self.styles.dim));
        }
    }
}

/// Renderer for the current output mode.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// Render an instance listing.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_instances(&self, instances: &[Instance]) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.render_instances(instances);
                Ok(())
            }
            Self::Json(r) => r.render_instances(instances),
        }
    }

    /// Render registered domains.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_domains(&self, domains: &[RegisteredDomain]) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.render_domains(domains);
                Ok(())
            }
            Self::Json(r) => r.render_domains(domains),
        }
    }

    /// Render a domain availability check.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_domain_check(&self, check: &DomainCheck) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.render_domain_check(check);
                Ok(())
            }
            Self::Json(r) => r.render_domain_check(check),
        }
    }

    /// Render the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(&self, config: &EcsConfig, path: &std::path::Path) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.render_config(config, path);
                Ok(())
            }
            Self::Json(r) => r.render_config(config, path),
        }
    }

    /// Render the result of `up`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_provisioned(&self, name: &str, provisioned: &Provisioned) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.render_provisioned(provisioned);
                Ok(())
            }
            Self::Json(r) => r.render_provisioned(name, provisioned),
        }
    }

    /// Render a validated dry-run `up`. Human mode has already reported it.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_dry_run(&self, name: &str) -> anyhow::Result<()> {
        match self {
            Self::Human(_) => Ok(()),
            Self::Json(r) => r.render_dry_run(name),
        }
    }

    /// Render copy totals. Human mode has already reported them as progress.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_transferred(&self, totals: &Transferred) -> anyhow::Result<()> {
        match self {
            Self::Human(_) => Ok(()),
            Self::Json(r) => r.render_transferred(totals),
        }
    }
}
