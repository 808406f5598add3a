pub mod alertmanager;
pub mod config;
pub mod format;
pub mod metrics;
pub mod platform;
pub mod provision;
pub mod registry;
pub mod server;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("alertmanager returned {status}: {body}")]
    BackendStatus { status: u16, body: String },
    #[error("giving up after {attempts} attempts to {method} {url}: {last}")]
    RetriesExhausted {
        method: String,
        url: String,
        attempts: u32,
        last: Box<Error>,
    },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("Invalid or missing token")]
    Auth,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("platform error: {0}")]
    Platform(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
