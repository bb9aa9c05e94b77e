//! Error types shared by the container readers and the motion decoder

use std::io;
use thiserror::Error;

/// Result type for sekai-asset operations
pub type Result<T> = std::result::Result<T, AssetError>;

/// Errors that can occur while decoding a container or a motion
#[derive(Error, Debug)]
pub enum AssetError {
    /// I/O errors when reading/writing files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed buffer (bad layout, offset out of range)
    #[error("Invalid format: {0}")]
    Format(String),

    /// Not enough data
    #[error("Not enough data: expected {expected}, got {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    /// Invalid magic / block signature
    #[error("Invalid signature: expected {expected}, got {actual}")]
    InvalidSignature { expected: String, actual: String },

    /// Tag or enum value this crate does not know about
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Referenced blob, cue or object is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// No generic binding covers the curve index
    #[error("No binding found for curve index {index}")]
    BindingNotFound { index: u32 },

    /// Serialization of an output document failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification used by the orchestrators to pick a propagation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Format,
    UnsupportedFormat,
    NotFound,
    BindingNotFound,
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Item-level failure, siblings continue
    Medium,
    /// The surrounding container cannot be processed
    High,
    /// Environment failure (disk, permissions)
    Critical,
}

impl AssetError {
    /// Create a new format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Self::Format(msg.into())
    }

    /// Create a new not enough data error
    pub fn not_enough_data(expected: usize, actual: usize) -> Self {
        Self::NotEnoughData { expected, actual }
    }

    /// Create a new invalid signature error
    pub fn invalid_signature<S: Into<String>>(expected: S, actual: S) -> Self {
        Self::InvalidSignature {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new binding not found error
    pub fn binding_not_found(index: u32) -> Self {
        Self::BindingNotFound { index }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AssetError::Io(_) => ErrorKind::Io,
            AssetError::Format(_)
            | AssetError::NotEnoughData { .. }
            | AssetError::InvalidSignature { .. }
            | AssetError::Serialization(_) => ErrorKind::Format,
            AssetError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            AssetError::NotFound(_) => ErrorKind::NotFound,
            AssetError::BindingNotFound { .. } => ErrorKind::BindingNotFound,
        }
    }

    /// Whether this error aborts the whole container rather than one item of it
    pub fn is_container_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Io | ErrorKind::Format | ErrorKind::UnsupportedFormat
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::Io => ErrorSeverity::Critical,
            ErrorKind::Format | ErrorKind::UnsupportedFormat => ErrorSeverity::High,
            ErrorKind::NotFound | ErrorKind::BindingNotFound => ErrorSeverity::Medium,
        }
    }
}

impl From<binrw::Error> for AssetError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::BadMagic { pos, .. } => {
                Self::format(format!("bad magic at offset {:#x}", pos))
            }
            binrw::Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Self::format("truncated header")
            }
            binrw::Error::Io(e) => Self::Io(e),
            other => Self::format(other.to_string()),
        }
    }
}

impl From<std::string::FromUtf8Error> for AssetError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::format(format!("Invalid UTF-8 string: {}", err))
    }
}

impl From<std::str::Utf8Error> for AssetError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::format(format!("Invalid UTF-8 string: {}", err))
    }
}
