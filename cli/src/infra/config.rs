//! Infrastructure implementation of the `ConfigStore` port, plus credential
//! loading from the environment.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::config::{Credentials, EcsConfig};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "ECSUP_CONFIG";

/// Prefix of the credential environment variables.
pub const CREDENTIALS_PREFIX: &str = "ECS_";

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
pub struct YamlConfigStore;

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<EcsConfig> {
        let path = self.path()?;
        if !path.exists() {
            return Ok(EcsConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(EcsConfig::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    fn save(&self, config: &EcsConfig) -> Result<()> {
        let path = self.path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(config).context("cannot serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("cannot write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("cannot set permissions on {}", path.display()))?;
        }
        Ok(())
    }

    fn path(&self) -> Result<PathBuf> {
        if let Ok(val) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".ecsup").join("config.yaml"))
    }
}

/// Read `ECS_*` credentials from the environment.
///
/// Every variable is optional at this point; commands that need API keys
/// call [`Credentials::api_keys`].
///
/// # Errors
///
/// Returns an error if a variable is set but not valid unicode.
pub fn load_credentials() -> Result<Credentials> {
    envy::prefixed(CREDENTIALS_PREFIX)
        .from_env()
        .context("failed to load credentials from ECS_* env vars")
}
