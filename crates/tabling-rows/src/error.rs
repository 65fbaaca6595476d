//! Error types for rows and schemas

/// Errors raised while building or addressing rows
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    /// Rendered row id could not be parsed
    #[error("invalid row id: '{0}'")]
    InvalidRowId(String),

    /// Field is not part of the table schema
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Field exists but cannot be written by users
    #[error("field is not editable: {0}")]
    ReadOnlyField(String),

    /// Schema declares the same field twice
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_error_display() {
        let err = RowError::UnknownField("rate".to_string());
        assert_eq!(err.to_string(), "unknown field: rate");

        let err = RowError::InvalidRowId("group-x".to_string());
        assert!(err.to_string().contains("group-x"));
    }
}
