//! Consumer key/secret pair used for the client-credentials grant.
//!
//! Credentials are kept in `~/.eumetsatapirc`, a small YAML mapping:
//!
//! ```yaml
//! consumer_key: aEfX6e1AvizULa48eo9R1v9A56md
//! consumer_secret: Uiaz51e8XAfmA969o1vR4aELdev6
//! ```
use crate::error::{ConfigError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const RC_FILE: &str = ".eumetsatapirc";
pub const RC_ENV: &str = "EUMETSAT_RC";
pub const KEY_ENV: &str = "EUMETSAT_CONSUMER_KEY";
pub const SECRET_ENV: &str = "EUMETSAT_CONSUMER_SECRET";

static API_KEY: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\w{28}$"));

#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    consumer_key: String,
    #[serde(default)]
    consumer_secret: String,
}

// Keep the secrets out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &"***")
            .field("consumer_secret", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn consumer_secret(&self) -> &str {
        &self.consumer_secret
    }

    /// Location of the rc file: `$EUMETSAT_RC` if set, otherwise `~/.eumetsatapirc`.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(RC_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        Ok(home.join(RC_FILE))
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let credentials: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })?;

        for (field, value) in credentials.fields() {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing {
                    path: path.to_owned(),
                    field,
                }
                .into());
            }
        }
        Ok(credentials)
    }

    /// Validate and persist the credentials, creating parent directories as needed.
    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        self.validate()?;

        let path = path.as_ref();
        let to_config_error = |source| ConfigError::Write {
            path: path.to_owned(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(to_config_error)?;
        }
        let content = serde_yaml::to_string(self).map_err(|e| {
            to_config_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        fs::write(path, content).map_err(to_config_error)?;
        restrict_permissions(path).map_err(to_config_error)?;
        Ok(())
    }

    /// API keys handed out by the EUMETSAT portal are 28 word characters long.
    pub fn validate(self: &Self) -> Result<()> {
        let pattern = API_KEY.as_ref().map_err(|e| ConfigError::Pattern(e.clone()))?;
        for (field, value) in self.fields() {
            if !pattern.is_match(value) {
                return Err(ConfigError::Invalid { field }.into());
            }
        }
        Ok(())
    }

    fn fields(&self) -> [(&'static str, &str); 2] {
        [
            ("consumer_key", &self.consumer_key),
            ("consumer_secret", &self.consumer_secret),
        ]
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Supplies credentials when the rc file is missing or unreadable.
pub trait CredentialPrompt {
    fn acquire(&self) -> Result<Credentials>;
}

/// Takes the key pair from `EUMETSAT_CONSUMER_KEY` and `EUMETSAT_CONSUMER_SECRET`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvPrompt;

impl CredentialPrompt for EnvPrompt {
    fn acquire(&self) -> Result<Credentials> {
        let key = std::env::var(KEY_ENV).map_err(|_| ConfigError::Env(KEY_ENV))?;
        let secret = std::env::var(SECRET_ENV).map_err(|_| ConfigError::Env(SECRET_ENV))?;
        Ok(Credentials::new(key, secret))
    }
}
