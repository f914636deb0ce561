use thiserror::Error;

/// Failure categories surfaced by a generation session. Every variant is
/// terminal for the submission that raised it; none are retried and none are
/// fatal to the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirageError {
    /// Bad or missing user input, rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The staging upload did not yield a usable URL.
    #[error("image upload failed: {0}")]
    Upload(String),

    /// The inference call failed: timeout, transport failure, or a
    /// non-success status from the remote endpoint.
    #[error("generation failed: {0}")]
    Remote(String),

    /// The remote call succeeded but the response is missing required fields.
    #[error("unexpected response from the model endpoint: {0}")]
    MalformedResponse(String),

    /// Fetching a generated asset failed.
    #[error("download failed: {0}")]
    Download(String),
}

impl MirageError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    pub fn download(message: impl Into<String>) -> Self {
        Self::Download(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, MirageError>;
