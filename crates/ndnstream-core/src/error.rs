//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Video size string is not of the form `<width>x<height>`
    #[error("incorrect video size specified: {value} (must be in a form <width>x<height>)")]
    InvalidVideoSize { value: String },

    /// A name component that must not be empty was empty
    #[error("{field} must not be empty")]
    EmptyName { field: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
