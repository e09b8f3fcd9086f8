//! Typed error hierarchy for tuinbeheer.
//!
//! Two top-level enums cover the two halves of the crate:
//! - `ServiceError`: garden service layer and HTTP API failures
//! - `ToolError`: build monitor, security review and auto-fix tooling failures

use thiserror::Error;

/// Errors from the garden service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("{resource} with ID {id} not found")]
    NotFound { resource: &'static str, id: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),
}

impl ServiceError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: i64) -> Self {
        Self::NotFound { resource, id }
    }

    /// Message shown to callers. Database details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err)
    }
}

/// Errors from the developer tooling commands.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required environment variable {name}")]
    MissingEnv { name: &'static str },

    #[error("Build command timed out after {seconds}s")]
    BuildTimeout { seconds: u64 },

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("Chat completion failed: {0}")]
    Model(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_not_found_formats_resource_and_id() {
        let err = ServiceError::not_found("Garden", 42);
        assert_eq!(err.to_string(), "Garden with ID 42 not found");
        match &err {
            ServiceError::NotFound { resource, id } => {
                assert_eq!(*resource, "Garden");
                assert_eq!(*id, 42);
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[test]
    fn service_error_validation_carries_field() {
        let err = ServiceError::validation("name", "Garden name is required");
        match &err {
            ServiceError::Validation { field, message } => {
                assert_eq!(field, "name");
                assert_eq!(message, "Garden name is required");
            }
            _ => panic!("Expected Validation"),
        }
        assert_eq!(err.public_message(), "Garden name is required");
    }

    #[test]
    fn service_error_database_hides_details() {
        let err: ServiceError = anyhow::anyhow!("no such table: gardens").into();
        assert!(matches!(err, ServiceError::Database(_)));
        assert_eq!(err.public_message(), "An unexpected error occurred");
        assert!(err.to_string().contains("no such table"));
    }

    #[test]
    fn tool_error_missing_env_names_variable() {
        let err = ToolError::MissingEnv { name: "GITHUB_TOKEN" };
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn tool_error_read_failed_carries_path() {
        use std::path::PathBuf;
        let path = PathBuf::from("test-results/jest-results.json");
        let err = ToolError::ReadFailed {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        match &err {
            ToolError::ReadFailed { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected ReadFailed"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ServiceError::Forbidden);
        assert_std_error(&ToolError::BuildTimeout { seconds: 300 });
    }
}
