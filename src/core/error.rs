use thiserror::Error;

/// Core error types for lootrule
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A filter line could not be understood during import
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An imported `BaseType` name has no match in the item catalog
    #[error("Unknown item base: {0}")]
    UnknownItemBase(String),

    /// A node id was not present in the collection it was expected in
    #[error("Not found: {0}")]
    NotFound(String),

    /// A node id is already present in the document
    #[error("Duplicate node id: {0}")]
    DuplicateId(uuid::Uuid),

    /// A recorded patch does not fit the document it is applied to
    #[error("Invalid patch at '{path}': {message}")]
    InvalidPatch { path: String, message: String },

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// Filter persistence failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn invalid_patch(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Filter store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid filter name: {0}")]
    InvalidName(String),

    #[error("Filter not found: {0}")]
    NotFound(String),

    #[error("Filter '{0}' already exists")]
    AlreadyExists(String),

    #[error("Data directory not available")]
    DataDirUnavailable,

    #[error("Game directory not configured")]
    GameDirUnset,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
