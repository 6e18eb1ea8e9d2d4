use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum PathflowError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unresolved path: {0}")]
    UnresolvedPath(String),
    #[error("{path} reference creates a cyclic dependency")]
    Cycle { path: String },
    #[error("Invalid attribute owner for '{path}': expected {expected}, found {found}")]
    OwnershipMismatch {
        path: String,
        expected: String,
        found: String,
    },
    #[error("{0}")]
    CustomValidation(String),
    #[error("Evaluation error: {0}")]
    Evaluation(String),
    #[error("Duplicate name: {0}")]
    Duplicate(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File System error: {0}")]
    Io(String),
}

impl PathflowError {
    /// True for the error kinds that are raised by validation and leave the store untouched.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PathflowError::Cycle { .. } | PathflowError::CustomValidation(_)
        )
    }

    pub(crate) fn cycle<P: fmt::Display>(path: P) -> Self {
        PathflowError::Cycle {
            path: path.to_string(),
        }
    }
}

impl From<toml::de::Error> for PathflowError {
    fn from(src: toml::de::Error) -> PathflowError {
        PathflowError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for PathflowError {
    fn from(src: toml::ser::Error) -> PathflowError {
        PathflowError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for PathflowError {
    fn from(src: JsonError) -> PathflowError {
        PathflowError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for PathflowError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => PathflowError::NotFound(format!("{x}")),
            _ => PathflowError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for PathflowError {
    fn from(x: fmt::Error) -> Self {
        PathflowError::Serialization(format!("{x}"))
    }
}
