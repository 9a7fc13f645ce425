//! Error types for conversion generation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("malformed universe: {0}")]
    MalformedUniverse(#[from] serde_json::Error),

    #[error("unknown type referenced: {0}")]
    UnknownType(String),

    #[error("unknown package: {0}")]
    UnknownPackage(String),

    #[error("unsupported +{tag} value on {target}: {value:?}")]
    UnsupportedDirective {
        target: String,
        tag: String,
        value: String,
    },

    #[error("unsupported explicit-from source: {0}")]
    UnsupportedExplicitSource(String),

    #[error(
        "duplicate conversion defined for {in_type} -> {out_type}: {first} and {second}"
    )]
    DuplicateConversion {
        in_type: String,
        out_type: String,
        first: String,
        second: String,
    },
}
