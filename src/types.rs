//! Shared error type and result alias.

use thiserror::Error;

/// Errors surfaced by narthex components.
///
/// Repository operations never panic across their boundary for expected
/// failure modes; they return one of these variants and the route layer
/// maps it to an HTTP status.
#[derive(Debug, Error)]
pub enum NarthexError {
    /// Connection-level failure (connect, ping, introspection).
    #[error("database error: {0}")]
    Database(String),

    /// Insert or update rejected by the collection.
    #[error("write failed: {0}")]
    Write(String),

    /// Read or aggregation rejected by the collection.
    #[error("query failed: {0}")]
    Query(String),

    /// Faceted search invoked without its required filter key.
    #[error("Must specify {0} to filter by.")]
    MissingRequiredFilter(&'static str),

    /// Create invoked with a record lacking its identifier field.
    #[error("record is missing its \"{0}\" field")]
    MissingIdentifier(&'static str),

    /// Faceted aggregation failed, typically an unbounded result set.
    #[error("Results too large, be more restrictive in filter")]
    ResultsTooLarge,

    /// Invalid startup configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket-level failure while binding or accepting.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NarthexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_filter_message() {
        let err = NarthexError::MissingRequiredFilter("dates");
        assert_eq!(err.to_string(), "Must specify dates to filter by.");
    }

    #[test]
    fn test_results_too_large_message() {
        let err = NarthexError::ResultsTooLarge;
        assert_eq!(
            err.to_string(),
            "Results too large, be more restrictive in filter"
        );
    }
}
