//! Application context — unified state passed to every command handler.
//!
//! `AppContext` loads configuration and credentials once and hands out the
//! adapters commands need. Adding a new cross-cutting concern requires only
//! one field change here; zero command signatures change.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::application::services::Polling;
use crate::domain::config::{Credentials, EcsConfig};
use crate::domain::error::TransportError;
use crate::infra::aliyun::AliyunEcs;
use crate::infra::domains::AliyunDomains;
use crate::infra::config::{YamlConfigStore, load_credentials};
use crate::infra::ssh::{SshAuth, SshConnector};
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `ECSUP_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Where the configuration lives.
    pub config_store: YamlConfigStore,
    /// Effective configuration.
    pub config: EcsConfig,
    /// `ECS_*` secrets from the environment.
    pub credentials: Credentials,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `ECSUP_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file or credentials cannot be read.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("ECSUP_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let config_store = YamlConfigStore;
        let config = config_store.load()?;
        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet || flags.output.json),
            mode,
            config_store,
            config,
            credentials: load_credentials()?,
            non_interactive,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress reporter bound to this context's output settings.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Poll cadence and deadline for one reconciliation run.
    #[must_use]
    pub fn polling(&self) -> Polling {
        Polling::new(self.config.poll_interval(), self.config.timeout())
    }

    /// Cloud API client built from the environment's API keys.
    ///
    /// # Errors
    ///
    /// Returns an error if either API key is missing.
    pub fn cloud(&self) -> Result<AliyunEcs> {
        let (id, secret) = self.credentials.api_keys()?;
        AliyunEcs::new(id, secret, self.config.endpoint.as_deref())
    }

    /// Domain registration client built from the same API keys.
    ///
    /// # Errors
    ///
    /// Returns an error if either API key is missing.
    pub fn domains(&self) -> Result<AliyunDomains> {
        let (id, secret) = self.credentials.api_keys()?;
        AliyunDomains::new(id, secret, None)
    }

    /// SSH connector for instances; a configured private key wins over the
    /// root password.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoCredentials`] when neither is available.
    pub fn connector(&self) -> Result<SshConnector> {
        let auth = match (&self.config.private_key, self.credentials.password()) {
            (Some(path), _) => SshAuth::PrivateKey(path.clone()),
            (None, Some(password)) => SshAuth::Password(password.to_string()),
            (None, None) => return Err(TransportError::NoCredentials.into()),
        };
        Ok(SshConnector::new(
            self.config.ssh_user.clone(),
            self.config.ssh_port,
            auth,
            self.config.connect_timeout(),
        ))
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `ECSUP_YES` env),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
