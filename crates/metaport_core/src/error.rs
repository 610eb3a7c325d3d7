use miette::Diagnostic;
use thiserror::Error;

use crate::import::ImportReport;

/// Problems reading or interpreting the TOML configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("Missing field: {0}")]
    MissingField(String),
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Request to {endpoint} failed after {attempts} attempt(s): {message}")]
    #[diagnostic(
        code(metaport_core::request_failed),
        help("Check network connectivity, the shop host and the access token")
    )]
    RequestFailed {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    #[error("Request to {endpoint} returned HTTP {status}")]
    #[diagnostic(
        code(metaport_core::http_status),
        help("Response body: {body}")
    )]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{operation}: {}", messages.join("; "))]
    #[diagnostic(
        code(metaport_core::remote_errors),
        help("The admin API rejected the request; the messages above are verbatim")
    )]
    RemoteErrors {
        operation: String,
        messages: Vec<String>,
    },

    #[error("{operation}: malformed response ({detail})")]
    #[diagnostic(
        code(metaport_core::malformed_response),
        help("The response did not have the expected shape; the API version may not match")
    )]
    MalformedResponse { operation: String, detail: String },

    #[error("metaobject {type_name}/{handle} (entry {index}): {message}")]
    #[diagnostic(
        code(metaport_core::entry_import_failed),
        help("Re-run with --skip-errors to record this failure and continue")
    )]
    EntryImportFailed {
        index: usize,
        type_name: String,
        handle: String,
        message: String,
    },

    #[error("back-reference write: {} failure(s): {}", failures.len(), failures.join("; "))]
    #[diagnostic(
        code(metaport_core::back_reference_write_failed),
        help("Every chunk was attempted; writes that succeeded were kept")
    )]
    BackReferenceWriteFailed {
        failures: Vec<String>,
        /// The finished run, including what was committed
        report: Box<ImportReport>,
    },

    #[error("Configuration error")]
    #[diagnostic(
        code(metaport_core::configuration_error),
        help("Check configuration file at {config_path}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },

    #[error("Serialization error")]
    #[diagnostic(
        code(metaport_core::serialization_error),
        help("Failed to serialize/deserialize {data_type}")
    )]
    SerializationError {
        data_type: String,
        #[source]
        cause: serde_json::Error,
    },

    #[error("IO error on {path}")]
    #[diagnostic(code(metaport_core::io_error))]
    Io {
        path: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("Unknown environment '{name}'")]
    #[diagnostic(
        code(metaport_core::unknown_environment),
        help("Configured environments: {}", available.join(", "))
    )]
    UnknownEnvironment { name: String, available: Vec<String> },

    #[error("Entry {index} is out of range")]
    #[diagnostic(
        code(metaport_core::entry_out_of_range),
        help("The document holds {count} entries (indices 0..{count})")
    )]
    EntryOutOfRange { index: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn remote(operation: impl Into<String>, messages: Vec<String>) -> Self {
        Self::RemoteErrors {
            operation: operation.into(),
            messages,
        }
    }

    pub fn malformed(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, cause: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            cause,
        }
    }

    pub fn serialization(data_type: impl Into<String>, cause: serde_json::Error) -> Self {
        Self::SerializationError {
            data_type: data_type.into(),
            cause,
        }
    }

    /// The report of a run that completed but still failed
    pub fn import_report(&self) -> Option<&ImportReport> {
        match self {
            Self::BackReferenceWriteFailed { report, .. } => Some(&**report),
            _ => None,
        }
    }

    pub fn entry_failed(
        index: usize,
        type_name: impl Into<String>,
        handle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::EntryImportFailed {
            index,
            type_name: type_name.into(),
            handle: handle.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Report;

    #[test]
    fn test_remote_errors_keep_messages_verbatim() {
        let error = CoreError::remote(
            "metaobjectUpsert",
            vec!["Value is invalid".to_string(), "Handle taken".to_string()],
        );
        assert_eq!(
            error.to_string(),
            "metaobjectUpsert: Value is invalid; Handle taken"
        );
    }

    #[test]
    fn test_entry_failure_names_the_entry() {
        let error = CoreError::entry_failed(2, "$app:Card", "hero", "Field 'title' is required");
        let report = Report::new(error);
        let output = format!("{:?}", report);
        assert!(output.contains("entry_import_failed"));
        assert!(output.contains("$app:Card/hero"));
        assert!(output.contains("Field 'title' is required"));
    }

    #[test]
    fn test_unknown_environment_lists_choices() {
        let error = CoreError::UnknownEnvironment {
            name: "staging".to_string(),
            available: vec!["dev".to_string(), "prod".to_string()],
        };
        let report = Report::new(error);
        let output = format!("{:?}", report);
        assert!(output.contains("Configured environments: dev, prod"));
    }
}
