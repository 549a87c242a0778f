//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Credentials were rejected, even after a refresh
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// File id is empty or malformed
    #[error("Invalid file id: {0}")]
    InvalidFileId(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::AuthenticationFailed(msg) => BridgeError::Unauthenticated(msg),
            GoogleDriveError::InvalidFileId(id) => {
                BridgeError::OperationFailed(format!("Invalid file id: {}", id))
            }
            GoogleDriveError::BridgeError(e) => e,
        }
    }
}
