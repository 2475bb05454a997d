use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RepodropError {
    #[error("invalid repository name: {0} (expected owner/name)")]
    InvalidRepository(String),

    #[error("invalid folder path: {0}")]
    InvalidFolderPath(String),

    #[error("access token is missing")]
    #[diagnostic(help("run `repodrop login` to authenticate"))]
    MissingToken,

    #[error("session expired; you have been logged out")]
    #[diagnostic(help("run `repodrop login` to authenticate again"))]
    AuthExpired,

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("GitHub returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("backend returned status {status}: {message}")]
    BackendStatus { status: u16, message: String },

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("could not create the cache file: {message}")]
    #[diagnostic(help("see {help_url} for setting up an empty repository"))]
    BootstrapFailed { message: String, help_url: String },

    #[error("request failed: {0}")]
    Network(String),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(String),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigValue(String),

    #[error("session storage error: {0}")]
    SessionStorage(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("no files selected")]
    NoFilesSelected,

    #[error("no archive selected for extraction")]
    NothingToExtract,

    #[error("{action} is not possible while {stage}")]
    InvalidTransition { stage: String, action: String },
}

/// Coarse classification used by callers that reinterpret failures
/// contextually (a 404 on a content probe means "empty").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthExpired,
    NotFound,
    RemoteFailure,
    NetworkFailure,
    Local,
}

impl RepodropError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepodropError::AuthExpired | RepodropError::MissingToken => ErrorKind::AuthExpired,
            RepodropError::NotFound { .. } => ErrorKind::NotFound,
            RepodropError::RemoteStatus { .. }
            | RepodropError::BackendStatus { .. }
            | RepodropError::UploadFailed(_)
            | RepodropError::BootstrapFailed { .. }
            | RepodropError::Decode(_) => ErrorKind::RemoteFailure,
            RepodropError::Network(_) => ErrorKind::NetworkFailure,
            _ => ErrorKind::Local,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        self.kind() == ErrorKind::AuthExpired
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Message suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            RepodropError::NotFound { message }
            | RepodropError::RemoteStatus { message, .. }
            | RepodropError::BackendStatus { message, .. }
            | RepodropError::UploadFailed(message)
            | RepodropError::BootstrapFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
