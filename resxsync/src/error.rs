//! All error types for the resxsync crate.
//!
//! These are returned from all fallible operations (scanning, reconciling, tabular conversion,
//! backend round-trips, etc.).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown format `{0}`")]
    UnknownFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("CSV parse error: {0}")]
    CsvParse(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("host error: {0}")]
    Host(String),

    #[error("neutral culture file is missing for resource `{resource}`")]
    MissingNeutralCulture { resource: String },

    #[error(
        "imported table is missing keys of project `{project}`, resource `{resource}`, culture `{culture}`: {}",
        quote_keys(.keys)
    )]
    MissingResource {
        project: String,
        resource: String,
        culture: String,
        keys: Vec<String>,
    },

    #[error("invalid table: {0}")]
    InvalidTable(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("sheet service error: {message}")]
    Service { message: String, transient: bool },
}

fn quote_keys(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("\"{k}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse classification of [`Error`] values, stable for callers that branch on outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Io,
    Parse,
    Config,
    InvalidInput,
    MissingNeutralCulture,
    MissingResource,
    Cancelled,
    Timeout,
    Service,
}

impl Error {
    /// Creates a new invalid-table error.
    pub fn invalid_table(message: impl Into<String>) -> Self {
        Error::InvalidTable(message.into())
    }

    /// Creates a new host error.
    pub fn host(message: impl Into<String>) -> Self {
        Error::Host(message.into())
    }

    /// Creates a transient service error (eligible for retry by the backend).
    pub fn transient(message: impl Into<String>) -> Self {
        Error::Service {
            message: message.into(),
            transient: true,
        }
    }

    /// Creates a permanent service error.
    pub fn service(message: impl Into<String>) -> Self {
        Error::Service {
            message: message.into(),
            transient: false,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Error::Io(_) => ErrorCode::Io,
            Error::Json(_) | Error::XmlParse(_) | Error::CsvParse(_) => ErrorCode::Parse,
            Error::Config(_) => ErrorCode::Config,
            Error::UnknownFormat(_)
            | Error::InvalidResource(_)
            | Error::InvalidTable(_)
            | Error::Host(_) => ErrorCode::InvalidInput,
            Error::MissingNeutralCulture { .. } => ErrorCode::MissingNeutralCulture,
            Error::MissingResource { .. } => ErrorCode::MissingResource,
            Error::Cancelled => ErrorCode::Cancelled,
            Error::Timeout { .. } => ErrorCode::Timeout,
            Error::Service { .. } => ErrorCode::Service,
        }
    }

    /// `true` for a cooperative stop requested by the caller. Timeouts are not cancellations.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// `true` when a backend may retry the failed call.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Service { transient: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_unknown_format_error() {
        let error = Error::UnknownFormat("xlsx".to_string());
        assert_eq!(error.to_string(), "unknown format `xlsx`");
    }

    #[test]
    fn test_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = Error::Io(io_error);
        assert!(error.to_string().contains("I/O error"));
        assert_eq!(error.error_code(), ErrorCode::Io);
    }

    #[test]
    fn test_missing_resource_lists_every_key() {
        let error = Error::MissingResource {
            project: "Web".to_string(),
            resource: "Resources/Strings".to_string(),
            culture: "fr".to_string(),
            keys: vec!["C".to_string(), "D".to_string()],
        };
        let message = error.to_string();
        assert!(message.contains("`Web`"));
        assert!(message.contains("`Resources/Strings`"));
        assert!(message.contains("\"C\", \"D\""));
        assert_eq!(error.error_code(), ErrorCode::MissingResource);
    }

    #[test]
    fn test_cancellation_is_distinct_from_timeout() {
        assert!(Error::Cancelled.is_cancellation());
        let timeout = Error::Timeout {
            operation: "update cells".to_string(),
        };
        assert!(!timeout.is_cancellation());
        assert_eq!(timeout.error_code(), ErrorCode::Timeout);
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::transient("rate limited").is_transient());
        assert!(!Error::service("forbidden").is_transient());
        assert!(!Error::Cancelled.is_transient());
    }

    #[test]
    fn test_error_debug() {
        let error = Error::InvalidTable("header too short".to_string());
        let debug = format!("{:?}", error);
        assert!(debug.contains("InvalidTable"));
        assert!(debug.contains("header too short"));
    }
}
