use std::{io, path::StripPrefixError};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use walkdir::Error as WalkdirError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum BuildonomyError {
    #[error("Link extractor error: {0}")]
    Codec(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl BuildonomyError {
    /// Missing documents, records and corpus roots all surface as NotFound.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BuildonomyError::NotFound(_))
    }
}

impl From<StripPrefixError> for BuildonomyError {
    fn from(src: StripPrefixError) -> BuildonomyError {
        BuildonomyError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<toml::de::Error> for BuildonomyError {
    fn from(src: toml::de::Error) -> BuildonomyError {
        BuildonomyError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for BuildonomyError {
    fn from(src: toml::ser::Error) -> BuildonomyError {
        BuildonomyError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for BuildonomyError {
    fn from(src: JsonError) -> BuildonomyError {
        BuildonomyError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for BuildonomyError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => BuildonomyError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => BuildonomyError::PermissionDenied,
            _ => BuildonomyError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<WalkdirError> for BuildonomyError {
    fn from(x: WalkdirError) -> Self {
        match x.into_io_error() {
            Some(io_error) => BuildonomyError::from(io_error),
            None => BuildonomyError::Io("directory walk hit a filesystem loop".to_string()),
        }
    }
}
