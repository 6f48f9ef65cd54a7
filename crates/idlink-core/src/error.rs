use std::path::PathBuf;

/// Core error types for idlink.
#[derive(Debug, thiserror::Error)]
pub enum IdlinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse stored record: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LINE API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Failure of a link mutation. `Duplicate` is a business outcome, not a
/// fault; store failures are wrapped so callers can downgrade them to a
/// user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("duplicate external id")]
    Duplicate,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LinkError {
    /// The message shown to the user in chat and on the registration page.
    pub fn user_message(&self) -> &'static str {
        match self {
            LinkError::Duplicate => "このIDは既に登録されています",
            LinkError::Store(_) => {
                "登録処理中にエラーが発生しました。しばらく経ってから再度お試しください。"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, IdlinkError>;
