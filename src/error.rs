use thiserror::Error;

/// Unified error type for release-train operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Version control command failed: {0}")]
    Vcs(String),

    #[error("Remote API returned HTTP {status}: {body}")]
    RemoteApi { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pipeline {id} finished with status '{status}'")]
    PipelineFailed { id: u64, status: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build failed: {0}")]
    Build(String),

    /// An error attributed to one service
    #[error("{service}: {error}")]
    Service {
        service: String,
        error: Box<ReleaseError>,
    },
}

/// Convenience type alias for Results in release-train
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a version-control error with captured diagnostics
    pub fn vcs(msg: impl Into<String>) -> Self {
        ReleaseError::Vcs(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ReleaseError::NotFound(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        ReleaseError::Timeout(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ReleaseError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    pub fn build(msg: impl Into<String>) -> Self {
        ReleaseError::Build(msg.into())
    }

    /// Attach the name of the service an error belongs to.
    ///
    /// Already-attributed errors are returned unchanged so the innermost
    /// service name wins.
    pub fn for_service(self, service: impl Into<String>) -> Self {
        match self {
            ReleaseError::Service { .. } => self,
            other => ReleaseError::Service {
                service: service.into(),
                error: Box::new(other),
            },
        }
    }

    /// True for errors raised because something expected was absent
    pub fn is_not_found(&self) -> bool {
        match self {
            ReleaseError::NotFound(_) => true,
            ReleaseError::Service { error, .. } => error.is_not_found(),
            _ => false,
        }
    }
}
