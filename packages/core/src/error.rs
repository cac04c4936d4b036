use thiserror::Error;

/// Unified crate error.
///
/// Covers the plumbing failures of the subsystem itself (config,
/// storage, serialisation, remote submission). Failures of the
/// application's own operations are described by
/// [`AppError`](crate::failure::AppError) instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Remote submission error: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("Remote sink rejected report: HTTP {status}")]
    RemoteStatus { status: u16 },
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
