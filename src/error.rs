use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("token request failed: {0}")]
    Auth(#[source] reqwest::Error),

    #[error("product search failed: {0}")]
    Search(#[source] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl Error {
    /// True when the failure comes from the credentials file rather than the network.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub(crate) fn download(url: &url::Url, source: impl Into<DownloadError>) -> Self {
        Self::Download {
            url: url.to_string(),
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to locate the home directory")]
    NoHome,

    #[error("unable to read credentials from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("credentials file {path} has an empty '{field}'")]
    Missing { path: PathBuf, field: &'static str },

    #[error("'{field}' does not look like an API key (expected 28 word characters)")]
    Invalid { field: &'static str },

    #[error("unable to write credentials to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("environment variable {0} is not set")]
    Env(&'static str),

    #[error("API key pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("received {received} bytes, expected {expected}")]
    Length { expected: u64, received: u64 },
}
