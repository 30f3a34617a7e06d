use std::{fmt, io};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum CasebindError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Invalid case identifier '{value}': {reason}")]
    InvalidId { value: String, reason: String },
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Structural parse error in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("Remote service error: {0}")]
    Remote(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Unresolvable container path '{path}': {reason}")]
    UnresolvedContainer { path: String, reason: String },
}

impl From<io::Error> for CasebindError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => CasebindError::NotFound(format!("{x}")),
            _ => CasebindError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for CasebindError {
    fn from(x: fmt::Error) -> Self {
        CasebindError::Serialization(format!("{x}"))
    }
}

impl From<toml::de::Error> for CasebindError {
    fn from(src: toml::de::Error) -> CasebindError {
        CasebindError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for CasebindError {
    fn from(src: toml::ser::Error) -> CasebindError {
        CasebindError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for CasebindError {
    fn from(src: JsonError) -> CasebindError {
        CasebindError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<RegexError> for CasebindError {
    fn from(x: RegexError) -> Self {
        CasebindError::Serialization(format!("Regex parse failed: {x}"))
    }
}

impl From<UrlParseError> for CasebindError {
    fn from(src: UrlParseError) -> CasebindError {
        CasebindError::Config(format!("Invalid URL: {src}"))
    }
}

impl From<reqwest::Error> for CasebindError {
    fn from(src: reqwest::Error) -> CasebindError {
        let status = src
            .status()
            .map(|s| format!(" (status {s})"))
            .unwrap_or_default();
        CasebindError::Remote(format!("{src}{status}"))
    }
}

impl From<walkdir::Error> for CasebindError {
    fn from(src: walkdir::Error) -> CasebindError {
        CasebindError::Io(format!("Directory walk failed: {src}"))
    }
}
