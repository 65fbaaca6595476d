//! Tabling Rows
//!
//! Typed rows, columns and row/model managers for hierarchical budget tables.
//!
//! # Core Concepts
//!
//! - [`Row`]: Closed sum over model, placeholder, group and markup rows
//! - [`RowId`] / [`EditableRowId`]: Collision-free row identifiers
//! - [`TableSchema`]: Column set fixing every row's field set
//! - [`ModelRowManager`] and friends: Pure model <-> row conversions
//! - [`DiagnosticSink`]: Injected channel for inconsistent-state reports
//!
//! # Example
//!
//! ```rust,ignore
//! use tabling_rows::{Column, Model, ModelId, ModelRowManager, TableSchema};
//!
//! let schema = TableSchema::new(vec![Column::body("rate", "Rate")])?;
//! let model = Model::new(ModelId(1)).with("rate", 12.5);
//! let row = ModelRowManager::create(&model, &schema);
//! assert_eq!(row.data["rate"].as_f64(), Some(12.5));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod column;
mod diagnostics;
mod error;
mod id;
mod manager;
mod model;
mod row;
mod value;

// Re-exports
pub use column::{Aggregate, Column, ColumnKind, MarkupFields, TableSchema};
pub use diagnostics::{DiagnosticSink, Inconsistency, NullSink, RecordingSink, TracingSink};
pub use error::RowError;
pub use id::{
    EditableRowId, GroupId, MarkupId, ModelId, PlaceholderId, RowId, GROUP_PREFIX, MARKUP_PREFIX,
    PLACEHOLDER_PREFIX,
};
pub use manager::{GroupRowManager, MarkupRowManager, ModelRowManager, PlaceholderRowManager};
pub use model::{
    GroupModel, ListResponse, MarkupModel, MarkupUnit, Model, Payload, TableResponse,
};
pub use row::{GroupRow, MarkupRow, ModelRow, PlaceholderRow, Row, RowType, RowsExt};
pub use value::{CellValue, RowData};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
