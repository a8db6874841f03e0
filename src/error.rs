use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Transient transport failure; callers queue the write or fall back to cache.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authenticated: {0}")]
    Auth(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Write rejected for {failed} of {total} records: {message}")]
    Write {
        failed: usize,
        total: usize,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    /// Errors worth retrying later without user involvement.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Write { .. })
    }

    /// Errors that end the operation and must reach the user.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::Permission(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

impl From<SyncError> for String {
    fn from(error: SyncError) -> Self {
        error.to_string()
    }
}
