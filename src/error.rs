use thiserror::Error;

/// Failure of a single remote call, as classified by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Backend error the service asks callers to retry.
    #[error("transient backend error ({status}): {message}")]
    Transient { status: u16, message: String },

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("connection failed: {0}")]
    Connectivity(String),

    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient { .. })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The retry budget of a single remote call ran out.
    #[error("timed out waiting for the backend to recover")]
    Timeout,

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connectivity(String),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid change time: {0}")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the whole run may be restarted from the last stored cursor.
    pub fn is_retryable_run(&self) -> bool {
        matches!(self, Error::Authentication(_) | Error::Connectivity(_))
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transient { status, message } | ApiError::Status { status, message } => {
                Error::Remote { status, message }
            }
            ApiError::Auth(msg) => Error::Authentication(msg),
            ApiError::Connectivity(msg) => Error::Connectivity(msg),
            ApiError::Decode(msg) => Error::Decode(msg),
        }
    }
}
