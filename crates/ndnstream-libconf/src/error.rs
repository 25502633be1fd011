//! Error types for libconfig parsing.

use thiserror::Error;

/// Errors produced while reading a libconfig document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibconfError {
    /// Input ended inside a construct
    #[error("unexpected end of input at line {line}: {expected}")]
    UnexpectedEof { line: usize, expected: String },

    /// A token that does not fit the grammar
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Mixed element types inside an array
    #[error("array at line {line} mixes {first} and {other} elements")]
    HeterogeneousArray {
        line: usize,
        first: String,
        other: String,
    },

    /// Two settings with the same name in one group
    #[error("duplicate setting {name} at line {line}")]
    DuplicateSetting { line: usize, name: String },

    /// Groups, lists or arrays nested past the parser's limit
    #[error("nesting deeper than {limit} levels at line {line}")]
    TooDeep { line: usize, limit: usize },
}

/// Result type for libconfig operations.
pub type Result<T> = std::result::Result<T, LibconfError>;
