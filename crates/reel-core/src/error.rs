//! Error types for Reel Core

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Story collection is empty")]
    EmptyCollection,

    #[error("Story {index} has no items")]
    EmptyStory { index: usize },

    #[error("Item {item} of story {story} has no source for every media tier")]
    MissingSource { story: usize, item: usize },

    // Playback errors
    #[error("Invalid playback phase transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Storage errors
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Engagement errors
    #[error("Visitor profile requires a name and a contact")]
    IncompleteProfile,

    // Network errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[cfg(feature = "runtime")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Media load failed: {url}")]
    MediaLoad { url: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::StorageUnavailable(msg.into())
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::StorageUnavailable(_) | Error::MediaLoad { .. } | Error::Io(_) => true,
            #[cfg(feature = "runtime")]
            Error::Network(_) => true,
            _ => false,
        }
    }

    /// Returns the error code for logs and host-side reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::EmptyCollection => "EMPTY_COLLECTION",
            Error::EmptyStory { .. } => "EMPTY_STORY",
            Error::MissingSource { .. } => "MISSING_SOURCE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Error::Serialization(_) => "SERIALIZATION",
            Error::IncompleteProfile => "INCOMPLETE_PROFILE",
            Error::InvalidUrl(_) => "INVALID_URL",
            #[cfg(feature = "runtime")]
            Error::Network(_) => "NETWORK",
            Error::MediaLoad { .. } => "MEDIA_LOAD",
            Error::Internal(_) => "INTERNAL",
            Error::Io(_) => "IO",
        }
    }
}
