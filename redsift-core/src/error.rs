use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors produced while talking to the content source, including the
/// per-request retry loop and the reply-tree walk over its payloads.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}")]
    Upstream { status: u16 },

    #[error("rate limited on {url}, gave up after {attempts} attempts")]
    ExhaustedRetries { url: String, attempts: u32 },

    #[error("malformed response: {details}")]
    MalformedResponse { details: String },

    #[error("reply tree exceeded maximum depth {depth}")]
    MalformedTree { depth: usize },

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether a caller outside the built-in retry loop could reasonably
    /// try the request again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(_) | FetchError::ExhaustedRetries { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid configuration format: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub trait ErrorExt {
    fn is_retryable(&self) -> bool;
    fn error_code(&self) -> &'static str;
}

impl ErrorExt for CoreError {
    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Fetch(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoreError::Fetch(_) => "FETCH",
            CoreError::Store(_) => "STORE",
            CoreError::Config(_) => "CONFIG",
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
        }
    }
}
