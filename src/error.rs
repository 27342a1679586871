//! Error types for the Monte Carlo provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while serving a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request to the API could not be completed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with errors, a bad status, or no data.
    #[error("API error: {0}")]
    Api(String),

    /// The credential test step rejected the submitted connection details.
    #[error("Credential validation failed: {}", summarize(.0))]
    CredentialValidation(Vec<Diagnostic>),

    /// Remote state disagrees with recorded state in a way that needs manual remediation.
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    /// Deletion was refused because `deletion_protection` is enabled.
    #[error("Deletion protected: {0}")]
    DeletionProtected(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::Api(msg) => msg,
            Self::CredentialValidation(_diags) => "credential validation failed",
            Self::Inconsistent(msg) => msg,
            Self::DeletionProtected(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Render this error as diagnostics for the plugin host.
    ///
    /// Credential validation failures expand into every diagnostic the API
    /// reported, warnings included. The result always holds at least one error.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            Self::CredentialValidation(mut diagnostics) => {
                if !crate::schema::has_errors(&diagnostics) {
                    diagnostics.insert(
                        0,
                        Diagnostic::error("Credential validation failed")
                            .with_detail("Connection details were not accepted by Monte Carlo"),
                    );
                }
                diagnostics
            },
            Self::DeletionProtected(msg) => vec![Diagnostic::error(msg).with_detail(
                "Deletion protection prevents this resource deletion even if it was already \
                 deleted from the real system.",
            )],
            Self::Inconsistent(msg) => vec![Diagnostic::error(msg).with_detail(
                "Users can manually fix remote state or delete this resource from the configuration.",
            )],
            other => vec![Diagnostic::error(other.to_string())],
        }
    }
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "no diagnostics reported".to_string();
    }
    diagnostics
        .iter()
        .map(|d| d.summary.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::Api("unauthorized".to_string());
        assert_eq!(format!("{}", err), "API error: unauthorized");

        let err = ProviderError::UnknownResource("custom_resource".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: custom_resource");
    }

    #[test]
    fn test_credential_validation_display() {
        let err = ProviderError::CredentialValidation(vec![
            Diagnostic::error("bad key"),
            Diagnostic::warning("slow network"),
        ]);
        assert_eq!(
            format!("{}", err),
            "Credential validation failed: bad key; slow network"
        );

        let err = ProviderError::CredentialValidation(vec![]);
        assert!(err.to_string().contains("no diagnostics reported"));
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(err.message(), "resource-123");

        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::Inconsistent("type mismatch".to_string());
        assert_eq!(err.message(), "type mismatch");
    }

    #[test]
    fn test_into_diagnostics_expands_validation() {
        let diagnostics = ProviderError::CredentialValidation(vec![
            Diagnostic::warning("w1"),
            Diagnostic::error("e1"),
        ])
        .into_diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);

        let diagnostics =
            ProviderError::CredentialValidation(vec![Diagnostic::warning("w1")]).into_diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);

        let diagnostics = ProviderError::CredentialValidation(vec![]).into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);

        let diagnostics = ProviderError::Api("boom".to_string()).into_diagnostics();
        assert_eq!(diagnostics[0].summary, "API error: boom");
    }

    #[test]
    fn test_deletion_protected_has_detail() {
        let diagnostics =
            ProviderError::DeletionProtected("set it to false".to_string()).into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.is_some());
    }
}
