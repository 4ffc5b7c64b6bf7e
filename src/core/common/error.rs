// Consider using the 'thiserror' crate if it simplifies things.
// For now, a manual definition, matching the error kinds surfaced at every
// manager boundary (kv, indexing, graph, vector, changefeed).
#[derive(Debug)]
pub enum ThemisError {
    /// Entity/edge/index/vector entry absent. Most lookups prefer returning
    /// `Option::None`; this variant is for APIs that cannot express absence
    /// structurally (e.g. deleting something that must exist).
    NotFound(String),
    /// A unique constraint probe found a different owner for the value.
    UniqueViolation { table: String, column: String, value: String },
    /// MVCC commit conflict; the caller may retry with fresh reads.
    ConflictRetryable,
    /// Vector insert/search against the wrong dimensionality.
    DimensionMismatch { expected: usize, actual: usize },
    /// Persisted index metric disagrees with the configured metric.
    MetricMismatch { expected: String, actual: String },
    /// Malformed key, empty primary key, bad config, non-UTF-8 where UTF-8
    /// is required.
    InvalidInput(String),
    /// Underlying store or filesystem error.
    IoFailure(std::io::Error),
    /// Local corruption (unreadable CDC counter, unparseable index/blob
    /// entry); the operation aborts but the rest of the system continues.
    Corruption(String),
    /// HNSW not initialized; callers fall back to brute force transparently,
    /// this variant only surfaces where that fallback cannot apply.
    UnavailableFeature(String),
    /// Serialization/deserialization of an entity or wire record failed.
    Serialization(String),
    /// In-memory structure lock was poisoned.
    Lock(String),
    /// Secondary index manager errors that do not map to a taxonomy kind
    /// above (no such index, range encoding failure).
    Index(String),
    /// Graph index manager errors (inconsistent edge, closed graph).
    Graph(String),
    /// Vector index manager errors not covered above.
    Vector(String),
    /// Changefeed errors (sequence corruption, record parse failure).
    Changefeed(String),
}

impl std::fmt::Display for ThemisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(s) => write!(f, "not found: {s}"),
            Self::UniqueViolation { table, column, value } => {
                write!(f, "unique violation on {table}.{column} = {value}")
            }
            Self::ConflictRetryable => write!(f, "conflict, retryable"),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            Self::MetricMismatch { expected, actual } => {
                write!(f, "metric mismatch: index configured for {expected}, got {actual}")
            }
            Self::InvalidInput(s) => write!(f, "invalid input: {s}"),
            Self::IoFailure(e) => write!(f, "io failure: {e}"),
            Self::Corruption(s) => write!(f, "corruption: {s}"),
            Self::UnavailableFeature(s) => write!(f, "unavailable feature: {s}"),
            Self::Serialization(s) => write!(f, "serialization error: {s}"),
            Self::Lock(s) => write!(f, "lock error: {s}"),
            Self::Index(s) => write!(f, "index error: {s}"),
            Self::Graph(s) => write!(f, "graph error: {s}"),
            Self::Vector(s) => write!(f, "vector error: {s}"),
            Self::Changefeed(s) => write!(f, "changefeed error: {s}"),
        }
    }
}

impl std::error::Error for ThemisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ThemisError {
    fn from(err: std::io::Error) -> Self {
        Self::IoFailure(err)
    }
}

impl From<serde_json::Error> for ThemisError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ThemisError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ThemisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_unique_violation_with_context() {
        let err = ThemisError::UniqueViolation {
            table: "users".into(),
            column: "email".into(),
            value: "a@x".into(),
        };
        assert_eq!(err.to_string(), "unique violation on users.email = a@x");
    }

    #[test]
    fn io_error_converts_and_retains_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ThemisError = io_err.into();
        assert!(matches!(err, ThemisError::IoFailure(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
