use thiserror::Error;

pub type ConcertoResult<T> = Result<T, ConcertoError>;

/// A span in a model source file, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Error, Debug)]
pub enum ConcertoError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A model failed validation while being loaded: unresolved import or
    /// type, duplicate declaration or property, disallowed super type,
    /// identifier problems, malformed validator, version mismatch.
    #[error("{message}")]
    IllegalModel {
        message: String,
        location: Option<FileLocation>,
    },

    #[error("Type {type_name} is not defined in the model manager")]
    TypeNotFound { type_name: String },

    /// An instance does not conform to its declaration.
    #[error("{message}")]
    ModelViolation { message: String },

    #[error("Invalid URI {uri}: {message}")]
    InvalidUri { uri: String, message: String },

    /// The instance generator hit a required field whose type is already
    /// being generated further up the stack.
    #[error("Model is recursive: cannot generate a value for the required field \"{field}\" of type {type_name}")]
    Recursion { type_name: String, field: String },

    #[error("Security error: {message}")]
    Security { message: String },
}

impl ConcertoError {
    pub fn illegal_model(message: impl Into<String>) -> Self {
        ConcertoError::IllegalModel {
            message: message.into(),
            location: None,
        }
    }

    pub fn model_violation(message: impl Into<String>) -> Self {
        ConcertoError::ModelViolation {
            message: message.into(),
        }
    }
}
