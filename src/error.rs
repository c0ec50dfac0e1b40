//! Error types for record operations against an AbraFlexi backend.

use serde_json::{Map, Value};
use thiserror::Error;

/// A single error entry reported by the server for a rejected write.
///
/// AbraFlexi returns write errors either as plain strings or as structured
/// objects carrying a `message` key plus positional context. The variant is
/// resolved once when the response body is parsed and never re-inspected
/// downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    Message(String),
    Structured(Map<String, Value>),
}

impl ErrorDetail {
    /// Classify a raw server error entry.
    ///
    /// Strings become `Message`, objects become `Structured`. Anything else
    /// (the server should not produce it) is kept as its compact JSON text.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => ErrorDetail::Message(s.clone()),
            Value::Object(obj) => ErrorDetail::Structured(obj.clone()),
            other => ErrorDetail::Message(other.to_string()),
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetail::Message(msg) => write!(f, "{}", msg),
            ErrorDetail::Structured(obj) => match obj.get("message").and_then(Value::as_str) {
                Some(msg) => write!(f, "{}", msg),
                None => write!(f, "{}", Value::Object(obj.clone())),
            },
        }
    }
}

/// Errors surfaced by record operations.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Field metadata could not be fetched. Callers degrade to "no
    /// validation possible"; this never blocks a list or show.
    #[error("schema for '{resource}' is unavailable: {message}")]
    SchemaUnavailable { resource: String, message: String },

    #[error("record '{id}' not found in '{resource}'")]
    RecordNotFound { resource: String, id: String },

    /// Transport failure or a response body that is not valid JSON.
    /// Terminal for the current invocation, never retried here.
    #[error("backend unreachable at {url}: {message}")]
    RemoteUnavailable { url: String, message: String },

    /// Empty create payload; carries the formatted mandatory-field list
    /// as guidance for the caller.
    #[error("no data provided for create on '{resource}'")]
    NoDataProvided {
        resource: String,
        mandatory: Vec<String>,
    },

    #[error("missing mandatory fields for '{resource}': {}", fields.join("; "))]
    MissingMandatoryFields {
        resource: String,
        fields: Vec<String>,
    },

    /// Non-success response code from a write, with the server's error
    /// entries preserved verbatim.
    #[error("server rejected the write with code {code}")]
    ServerRejected { code: u16, errors: Vec<ErrorDetail> },

    #[error("unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },
}

impl OperationError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoDataProvided { .. }
            | Self::MissingMandatoryFields { .. }
            | Self::ServerRejected { .. } => 1,
            Self::SchemaUnavailable { .. }
            | Self::RecordNotFound { .. }
            | Self::UnsupportedOperation { .. } => 2,
            Self::RemoteUnavailable { .. } => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_detail_from_string() {
        let detail = ErrorDetail::from_value(&json!("Pole 'kod' je povinné"));
        assert_eq!(detail.to_string(), "Pole 'kod' je povinné");
    }

    #[test]
    fn error_detail_from_object_with_message() {
        let detail = ErrorDetail::from_value(&json!({
            "message": "required field missing",
            "for": "kod"
        }));
        assert!(matches!(detail, ErrorDetail::Structured(_)));
        assert_eq!(detail.to_string(), "required field missing");
    }

    #[test]
    fn error_detail_from_object_without_message() {
        let detail = ErrorDetail::from_value(&json!({ "code": "ERR42" }));
        assert_eq!(detail.to_string(), r#"{"code":"ERR42"}"#);
    }

    #[test]
    fn exit_codes() {
        let err = OperationError::MissingMandatoryFields {
            resource: "faktura-vydana".into(),
            fields: vec!["kod (Code) [string]".into()],
        };
        assert_eq!(err.exit_code(), 1);

        let err = OperationError::UnsupportedOperation {
            operation: "delete".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = OperationError::RemoteUnavailable {
            url: "https://demo.flexibee.eu".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_mandatory_display_lists_fields() {
        let err = OperationError::MissingMandatoryFields {
            resource: "adresar".into(),
            fields: vec!["kod (Code) [string]".into(), "nazev (Name) [string]".into()],
        };
        assert_eq!(
            err.to_string(),
            "missing mandatory fields for 'adresar': kod (Code) [string]; nazev (Name) [string]"
        );
    }
}
