//! Inconsistency reporting
//!
//! References that cannot be resolved (a child id missing from the rows, an
//! event naming a row that was already deleted) are expected under benign
//! event-ordering races. They are reported to an injected [`DiagnosticSink`]
//! and the operation continues with what it could resolve.

use crate::id::{EditableRowId, GroupId, MarkupId, PlaceholderId, RowId};
use parking_lot::Mutex;
use std::fmt;

/// A reference that could not be resolved against the current rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// Event targets a row that is not in the table
    RowNotFound {
        /// Missing row
        id: RowId,
        /// Operation that looked it up
        context: &'static str,
    },
    /// Event targets a group that is not in the table
    GroupNotFound {
        /// Missing group
        id: GroupId,
        /// Operation that looked it up
        context: &'static str,
    },
    /// Event targets a markup that is not in the table
    MarkupNotFound {
        /// Missing markup
        id: MarkupId,
        /// Operation that looked it up
        context: &'static str,
    },
    /// Aggregate references a child that is not in the table
    ChildNotFound {
        /// Aggregate row
        parent: RowId,
        /// Missing child
        child: EditableRowId,
    },
    /// Activation names a placeholder that is no longer in the table
    PlaceholderNotFound {
        /// Missing placeholder
        id: PlaceholderId,
    },
}

impl Inconsistency {
    /// Short machine-readable kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RowNotFound { .. } => "row_not_found",
            Self::GroupNotFound { .. } => "group_not_found",
            Self::MarkupNotFound { .. } => "markup_not_found",
            Self::ChildNotFound { .. } => "child_not_found",
            Self::PlaceholderNotFound { .. } => "placeholder_not_found",
        }
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowNotFound { id, context } => write!(f, "{context}: row {id} not found"),
            Self::GroupNotFound { id, context } => write!(f, "{context}: group {id} not found"),
            Self::MarkupNotFound { id, context } => write!(f, "{context}: markup {id} not found"),
            Self::ChildNotFound { parent, child } => {
                write!(f, "child {child} of {parent} not found")
            }
            Self::PlaceholderNotFound { id } => write!(f, "placeholder {id} not found"),
        }
    }
}

/// Receiver of inconsistency reports
pub trait DiagnosticSink: Send + Sync {
    /// Report an inconsistency
    fn inconsistent(&self, inconsistency: Inconsistency);
}

/// Forwards reports to `tracing` as structured warnings
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn inconsistent(&self, inconsistency: Inconsistency) {
        tracing::warn!(
            kind = inconsistency.kind(),
            detail = %inconsistency,
            "inconsistent table state"
        );
    }
}

/// Discards reports
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn inconsistent(&self, _inconsistency: Inconsistency) {}
}

/// Keeps reports in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Inconsistency>>,
}

impl RecordingSink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far
    #[must_use]
    pub fn reports(&self) -> Vec<Inconsistency> {
        self.reports.lock().clone()
    }

    /// Number of reports received
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Check whether nothing was reported
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Drop all reports
    pub fn clear(&self) {
        self.reports.lock().clear();
    }
}

impl DiagnosticSink for RecordingSink {
    fn inconsistent(&self, inconsistency: Inconsistency) {
        self.reports.lock().push(inconsistency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ModelId;

    #[test]
    fn recording_sink_keeps_reports() {
        let sink = RecordingSink::new();
        sink.inconsistent(Inconsistency::RowNotFound {
            id: RowId::Model(ModelId(4)),
            context: "data_change",
        });

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.reports()[0].kind(), "row_not_found");

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn inconsistency_display() {
        let report = Inconsistency::ChildNotFound {
            parent: RowId::Group(GroupId(1)),
            child: EditableRowId::Model(ModelId(2)),
        };
        assert_eq!(report.to_string(), "child 2 of group-1 not found");
    }

    #[test]
    fn sinks_are_object_safe() {
        let sinks: Vec<Box<dyn DiagnosticSink>> =
            vec![Box::new(TracingSink), Box::new(NullSink), Box::new(RecordingSink::new())];
        for sink in &sinks {
            sink.inconsistent(Inconsistency::PlaceholderNotFound {
                id: PlaceholderId::new(),
            });
        }
    }
}
