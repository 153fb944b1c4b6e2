//! Error taxonomy shared by the engine and its collaborators.

use std::fmt::Display;

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T, E = QmsError> = std::result::Result<T, E>;

/// Errors surfaced by the engine or reported by a collaborator.
///
/// Malformed input on the read path (bad review blobs, unparseable dates,
/// odd codes) is normally recovered locally; [`QmsError::MalformedData`]
/// only escapes from the strict parsing entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QmsError {
    /// The tabular or document source could not be reached.
    #[error("{source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("malformed {what}: {detail}")]
    MalformedData { what: &'static str, detail: String },

    /// A status outside the enumerated set was requested.
    #[error("invalid status '{0}': expected approved, rejected or pending_review")]
    InvalidStatus(String),

    #[error("no record with code '{0}'")]
    UnknownRecord(String),

    #[error("record '{code}' has no file '{file_id}'")]
    UnknownFile { code: String, file_id: String },

    /// A write-back was rejected. `message` carries the source's own text.
    #[error("write to {target} failed: {message}")]
    WriteFailure { target: String, message: String },
}

impl QmsError {
    pub fn unavailable(source_name: impl Into<String>, err: impl Display) -> Self {
        QmsError::SourceUnavailable {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }

    pub fn write_failure(target: impl Into<String>, err: impl Display) -> Self {
        QmsError::WriteFailure {
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Machine-readable code used by the JSON API error body.
    pub fn code(&self) -> &'static str {
        match self {
            QmsError::SourceUnavailable { .. } => "source_unavailable",
            QmsError::MalformedData { .. } => "malformed_data",
            QmsError::InvalidStatus(_) => "invalid_status",
            QmsError::UnknownRecord(_) | QmsError::UnknownFile { .. } => "not_found",
            QmsError::WriteFailure { .. } => "write_failure",
        }
    }
}
