//! Table reducer
//!
//! [`TableReducer`] bundles what the pure state transitions need: the
//! schema, the optional derived-field hook and the diagnostics sink. Its
//! entry points take the current rows by reference and return new rows.

use crate::aggregates;
use crate::event::DataChangeEvent;
use crate::ordering::order_rows;
use crate::recalculate::RecalculateRow;
use std::fmt;
use std::sync::Arc;
use tabling_rows::{
    DiagnosticSink, EditableRowId, GroupRowManager, MarkupRowManager, ModelRowManager, Row,
    RowData, TableResponse, TableSchema, TracingSink,
};

/// Result of applying a change event
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeOutcome {
    /// New row collection
    pub rows: Vec<Row>,
    /// Data edits as actually applied (old values read from the rows), for history
    pub applied: Option<DataChangeEvent>,
}

impl ChangeOutcome {
    /// Outcome without recordable edits
    #[inline]
    #[must_use]
    pub fn structural(rows: Vec<Row>) -> Self {
        Self {
            rows,
            applied: None,
        }
    }
}

/// Pure reducer over a table's rows
#[derive(Clone)]
pub struct TableReducer {
    pub(crate) schema: Arc<TableSchema>,
    pub(crate) recalculate: Option<Arc<dyn RecalculateRow>>,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for TableReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableReducer")
            .field("columns", &self.schema.columns().len())
            .field("recalculate", &self.recalculate.is_some())
            .finish_non_exhaustive()
    }
}

impl TableReducer {
    /// Create reducer reporting inconsistencies through `tracing`
    #[inline]
    #[must_use]
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            recalculate: None,
            sink: Arc::new(TracingSink),
        }
    }

    /// With derived-field hook
    #[inline]
    #[must_use]
    pub fn with_recalculate(mut self, hook: impl RecalculateRow + 'static) -> Self {
        self.recalculate = Some(Arc::new(hook));
        self
    }

    /// With diagnostics sink
    #[inline]
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Table schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Shared schema handle
    #[inline]
    #[must_use]
    pub fn schema_arc(&self) -> Arc<TableSchema> {
        Arc::clone(&self.schema)
    }

    /// Diagnostics sink
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }

    /// Build the full row collection from a list response
    ///
    /// Groups are applied in response order; a later group's children take
    /// precedence over an earlier one's, and likewise for markups.
    #[must_use]
    pub fn populate(&self, response: &TableResponse) -> Vec<Row> {
        let mut rows: Vec<Row> = response
            .models
            .iter()
            .map(|m| Row::Model(ModelRowManager::create(m, &self.schema)))
            .collect();

        for group in &response.groups {
            let row = GroupRowManager::create(group, &rows, &self.schema, self.sink());
            aggregates::strip_from_groups(&mut rows, &row.children, None);
            rows.push(Row::Group(row));
        }
        for markup in &response.markups {
            let row = MarkupRowManager::create(markup, &rows, &self.schema, self.sink());
            aggregates::strip_from_markups(&mut rows, &row.children, None);
            rows.push(Row::Markup(row));
        }

        self.finish(rows)
    }

    /// Run the derived-field hook over one row's data
    pub(crate) fn recalculated(&self, mut data: RowData) -> RowData {
        if let Some(hook) = &self.recalculate {
            let derived = hook.recalculate(&data, &self.schema);
            data.extend(derived);
        }
        data
    }

    /// Refresh aggregates, then order
    pub(crate) fn finish(&self, mut rows: Vec<Row>) -> Vec<Row> {
        aggregates::refresh(&mut rows, &self.schema, self.sink());
        order_rows(rows)
    }

    /// Position of an editable row
    pub(crate) fn position_of(rows: &[Row], id: EditableRowId) -> Option<usize> {
        rows.iter().position(|r| r.editable_id() == Some(id))
    }
}
