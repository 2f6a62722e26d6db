use thiserror::Error;

/// Errors raised by the translation engine and its collaborators.
///
/// Nothing here is fatal: every failure path degrades to keeping the previous
/// state or falling back to the bundled asset table.
#[derive(Debug, Error)]
pub enum LocalizeError {
    /// The device reported no connectivity; no request was attempted.
    #[error("no network connectivity")]
    NoConnectivity,

    /// Connection, timeout or body read failure.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status} for {url}")]
    Status { status: u16, url: String },

    /// The response body was not the JSON we expected.
    #[error("malformed response: {0}")]
    Parse(String),

    #[error("invalid locale '{0}'")]
    InvalidLocale(String),

    /// The key-value store could not be read or written.
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// A refresh was requested while another one is still running.
    #[error("a refresh is already in flight")]
    RefreshInFlight,
}

impl From<serde_json::Error> for LocalizeError {
    fn from(err: serde_json::Error) -> Self {
        LocalizeError::Parse(err.to_string())
    }
}

impl LocalizeError {
    /// Whether retrying the same request could succeed.
    ///
    /// Transport errors, 429 and 5xx are retryable; other client errors and
    /// parse failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LocalizeError::Transport(_) => true,
            LocalizeError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T, E = LocalizeError> = std::result::Result<T, E>;
