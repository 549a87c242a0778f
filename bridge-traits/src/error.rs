use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote store rejected the credentials even after a refresh.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns true when the error reports rejected credentials.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, BridgeError::Unauthenticated(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
