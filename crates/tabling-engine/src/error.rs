//! Error types for the table engine
//!
//! Only contract violations surface as errors. Inconsistent local state
//! (missing rows, groups or placeholders) is reported to the diagnostics
//! sink and routed around.

use tabling_rows::{RowError, RowId};

/// Table engine errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    /// Row add supplied a different number of placeholder ids than rows requested
    #[error("placeholder count mismatch: {requested} rows requested, {supplied} ids supplied")]
    PlaceholderCountMismatch {
        /// Rows the payload asks for
        requested: usize,
        /// Placeholder ids supplied by the caller
        supplied: usize,
    },

    /// Row add reused an id already present in the table
    #[error("duplicate row id: {0}")]
    DuplicateRowId(RowId),

    /// Schema or row construction failed
    #[error("row error: {0}")]
    Row(#[from] RowError),
}

impl TableError {
    /// Check if error is a caller contract violation
    #[inline]
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::PlaceholderCountMismatch { .. } | Self::DuplicateRowId(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_error_display() {
        let err = TableError::PlaceholderCountMismatch {
            requested: 3,
            supplied: 2,
        };
        assert!(err.to_string().contains("3 rows requested"));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn row_errors_convert() {
        let err: TableError = RowError::UnknownField("x".to_string()).into();
        assert!(!err.is_contract_violation());
    }
}
