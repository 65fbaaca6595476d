//! Row/model managers
//!
//! Pure conversions between server models and rows:
//! - [`ModelRowManager`]: model -> row, row -> minimal update payload
//! - [`PlaceholderRowManager`]: blank/optimistic rows, create payloads
//! - [`GroupRowManager`]: group model -> aggregate row
//! - [`MarkupRowManager`]: markup model -> aggregate row, child contributions
//!
//! Conversions are total and deterministic: every row carries the schema's
//! field set, so reducers never special-case missing fields.

use crate::column::TableSchema;
use crate::diagnostics::{DiagnosticSink, Inconsistency};
use crate::id::{EditableRowId, MarkupId, PlaceholderId, RowId};
use crate::model::{GroupModel, MarkupModel, MarkupUnit, Model, Payload};
use crate::row::{GroupRow, MarkupRow, ModelRow, PlaceholderRow, Row, RowsExt};
use crate::value::{CellValue, RowData};

/// Converts persisted models to rows and back
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRowManager;

impl ModelRowManager {
    /// Build the row for a model
    #[must_use]
    pub fn create(model: &Model, schema: &TableSchema) -> ModelRow {
        ModelRow {
            id: model.id,
            model_id: model.id,
            data: schema.shape(model.attributes.clone(), |_| CellValue::Null),
        }
    }

    /// Minimal update payload: editable fields whose value differs from the original model
    #[must_use]
    pub fn payload(row: &ModelRow, original: &Model, schema: &TableSchema) -> Payload {
        Payload(
            schema
                .editable_fields()
                .filter_map(|field| {
                    let current = row.data.get(field).cloned().unwrap_or_default();
                    (current != *original.get(field)).then(|| (field.to_string(), current))
                })
                .collect(),
        )
    }

    /// Update payload from `(field, new value)` pairs, keeping editable fields only
    #[must_use]
    pub fn payload_from_changes<'a>(
        changes: impl IntoIterator<Item = (&'a str, &'a CellValue)>,
        schema: &TableSchema,
    ) -> Payload {
        Payload(
            changes
                .into_iter()
                .filter(|(field, _)| schema.require_editable(field).is_ok())
                .map(|(field, value)| (field.to_string(), value.clone()))
                .collect(),
        )
    }
}

/// Builds rows that are not persisted yet
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRowManager;

impl PlaceholderRowManager {
    /// Build a placeholder from partial data; missing fields take column defaults
    #[must_use]
    pub fn create(id: PlaceholderId, data: RowData, schema: &TableSchema) -> PlaceholderRow {
        PlaceholderRow {
            id,
            data: schema.shape(data, crate::column::Column::initial_value),
        }
    }

    /// Build a placeholder holding only column defaults
    #[inline]
    #[must_use]
    pub fn create_blank(id: PlaceholderId, schema: &TableSchema) -> PlaceholderRow {
        PlaceholderRow {
            id,
            data: schema.blank_data(),
        }
    }

    /// Build one blank placeholder per id
    #[must_use]
    pub fn create_many(ids: &[PlaceholderId], schema: &TableSchema) -> Vec<PlaceholderRow> {
        ids.iter()
            .map(|id| Self::create_blank(*id, schema))
            .collect()
    }

    /// Create payload: every editable field holding a value
    #[must_use]
    pub fn payload(row: &PlaceholderRow, schema: &TableSchema) -> Payload {
        Payload(
            schema
                .editable_fields()
                .filter_map(|field| {
                    row.data
                        .get(field)
                        .filter(|v| !v.is_null())
                        .map(|v| (field.to_string(), v.clone()))
                })
                .collect(),
        )
    }
}

/// Sum aggregate fields over the resolvable children
///
/// Returns the resolved children (in the given order) and the aggregate data.
/// Unresolvable children are reported and left out.
fn sum_children(
    parent: RowId,
    children: &[EditableRowId],
    rows: &[Row],
    schema: &TableSchema,
    sink: &dyn DiagnosticSink,
) -> (Vec<EditableRowId>, RowData) {
    let mut resolved = Vec::with_capacity(children.len());
    let mut data: RowData = schema
        .aggregate_fields()
        .map(|f| (f.to_string(), CellValue::Number(0.0)))
        .collect();

    for child in children {
        let Some(row) = rows.find_row((*child).into()) else {
            sink.inconsistent(Inconsistency::ChildNotFound {
                parent,
                child: *child,
            });
            continue;
        };
        if resolved.contains(child) {
            continue;
        }
        resolved.push(*child);
        for (field, total) in &mut data {
            let sum = total.as_f64_or_zero() + row.get(field).as_f64_or_zero();
            *total = CellValue::Number(sum);
        }
    }

    (resolved, data)
}

/// Builds and refreshes group aggregate rows
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupRowManager;

impl GroupRowManager {
    /// Build the row for a group against the current rows
    #[must_use]
    pub fn create(
        group: &GroupModel,
        rows: &[Row],
        schema: &TableSchema,
        sink: &dyn DiagnosticSink,
    ) -> GroupRow {
        let children: Vec<EditableRowId> =
            group.children.iter().map(|id| EditableRowId::Model(*id)).collect();
        let (children, data) = sum_children(RowId::Group(group.id), &children, rows, schema, sink);
        GroupRow {
            id: group.id,
            name: group.name.clone(),
            color: group.color.clone(),
            children,
            data,
        }
    }

    /// Recompute children and aggregates of an existing group row
    #[must_use]
    pub fn refreshed(
        group: &GroupRow,
        rows: &[Row],
        schema: &TableSchema,
        sink: &dyn DiagnosticSink,
    ) -> GroupRow {
        let (children, data) = sum_children(RowId::Group(group.id), &group.children, rows, schema, sink);
        GroupRow {
            children,
            data,
            ..group.clone()
        }
    }
}

/// Builds markup aggregate rows and their contributions to child rows
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupRowManager;

impl MarkupRowManager {
    /// Build the row for a markup against the current rows
    #[must_use]
    pub fn create(
        markup: &MarkupModel,
        rows: &[Row],
        schema: &TableSchema,
        sink: &dyn DiagnosticSink,
    ) -> MarkupRow {
        let row = MarkupRow {
            id: markup.id,
            identifier: markup.identifier.clone(),
            description: markup.description.clone(),
            unit: markup.unit,
            rate: markup.rate,
            children: markup.children.iter().map(|id| EditableRowId::Model(*id)).collect(),
            data: RowData::new(),
        };
        Self::refreshed(&row, rows, schema, sink)
    }

    /// Recompute children and amount of an existing markup row
    #[must_use]
    pub fn refreshed(
        markup: &MarkupRow,
        rows: &[Row],
        schema: &TableSchema,
        sink: &dyn DiagnosticSink,
    ) -> MarkupRow {
        let fields = schema.markup_fields();
        let (children, sums) =
            sum_children(RowId::Markup(markup.id), &markup.children, rows, schema, sink);

        let base_total: f64 = children
            .iter()
            .filter_map(|c| rows.find_row((*c).into()))
            .map(|r| r.get(&fields.base).as_f64_or_zero())
            .sum();
        let amount = Self::amount(markup.unit, markup.rate, base_total);

        let mut data: RowData = sums.into_keys().map(|f| (f, CellValue::Null)).collect();
        data.insert(fields.amount.clone(), CellValue::Number(amount));

        MarkupRow {
            children,
            data,
            ..markup.clone()
        }
    }

    /// Markup amount for a unit, rate and base total
    #[inline]
    #[must_use]
    pub fn amount(unit: MarkupUnit, rate: f64, base_total: f64) -> f64 {
        match unit {
            MarkupUnit::Percent => rate * base_total,
            MarkupUnit::Flat => rate,
        }
    }

    /// Contribution the given markups make to one child row
    ///
    /// Only percent markups distribute onto children; flat markups stand alone.
    #[must_use]
    pub fn contribution(row: &Row, markups: &[&MarkupRow], schema: &TableSchema) -> f64 {
        let Some(id) = row.editable_id() else {
            return 0.0;
        };
        let base = row.get(&schema.markup_fields().base).as_f64_or_zero();
        markups
            .iter()
            .filter(|m| m.unit == MarkupUnit::Percent && m.children.contains(&id))
            .map(|m| m.rate * base)
            .sum()
    }

    /// Ids of markups that reference a child
    #[must_use]
    pub fn markups_containing(rows: &[Row], child: EditableRowId) -> Vec<MarkupId> {
        rows.markups_of(child).into_iter().map(|m| m.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::diagnostics::{NullSink, RecordingSink};
    use crate::id::{GroupId, ModelId};
    use pretty_assertions::assert_eq;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::body("description", "Description").with_default("New line"),
            Column::body("rate", "Rate").with_default(0.0),
            Column::calculated("estimated", "Estimated").summed(),
            Column::read_only("actual", "Actual").summed(),
            Column::calculated("markup_contribution", "Markup").summed(),
        ])
        .unwrap()
    }

    fn model(id: u64, estimated: f64) -> Model {
        Model::new(ModelId(id))
            .with("description", format!("line {id}"))
            .with("estimated", estimated)
    }

    fn rows(models: &[Model]) -> Vec<Row> {
        models
            .iter()
            .map(|m| Row::Model(ModelRowManager::create(m, &schema())))
            .collect()
    }

    #[test]
    fn model_row_has_full_field_set() {
        let row = ModelRowManager::create(&model(1, 10.0), &schema());

        assert_eq!(row.id, ModelId(1));
        assert_eq!(row.model_id, ModelId(1));
        assert_eq!(row.data.len(), schema().columns().len());
        assert_eq!(row.data["rate"], CellValue::Null);
    }

    #[test]
    fn same_model_yields_identical_rows() {
        let a = ModelRowManager::create(&model(1, 10.0), &schema());
        let b = ModelRowManager::create(&model(1, 10.0), &schema());
        assert_eq!(a, b);
    }

    #[test]
    fn update_payload_contains_only_changed_editable_fields() {
        let original = model(1, 10.0).with("rate", 2.0);
        let mut row = ModelRowManager::create(&original, &schema());
        row.data.insert("rate".to_string(), CellValue::Number(3.0));
        row.data.insert("estimated".to_string(), CellValue::Number(99.0));

        let payload = ModelRowManager::payload(&row, &original, &schema());
        assert_eq!(payload.0.len(), 1);
        assert_eq!(payload.get("rate"), Some(&CellValue::Number(3.0)));
    }

    #[test]
    fn payload_from_changes_skips_calculated_fields() {
        let rate = CellValue::Number(4.0);
        let estimated = CellValue::Number(40.0);
        let payload = ModelRowManager::payload_from_changes(
            [("rate", &rate), ("estimated", &estimated)],
            &schema(),
        );
        assert_eq!(payload.0.keys().collect::<Vec<_>>(), vec!["rate"]);
    }

    #[test]
    fn placeholders_take_column_defaults() {
        let ids = PlaceholderId::generate(3);
        let rows = PlaceholderRowManager::create_many(&ids, &schema());

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].data["description"], CellValue::from("New line"));
        assert_eq!(rows[2].id, ids[2]);
    }

    #[test]
    fn placeholder_payload_omits_nulls() {
        let mut data = RowData::new();
        data.insert("description".to_string(), CellValue::Null);
        data.insert("rate".to_string(), CellValue::Number(5.0));
        let row = PlaceholderRowManager::create(PlaceholderId::new(), data, &schema());

        let payload = PlaceholderRowManager::payload(&row, &schema());
        assert_eq!(payload.0.len(), 1);
        assert_eq!(payload.get("rate"), Some(&CellValue::Number(5.0)));
    }

    #[test]
    fn group_row_sums_children() {
        let rows = rows(&[model(1, 10.0), model(2, 20.0)]);
        let group = GroupModel::new(GroupId(7), "Crew", vec![ModelId(1), ModelId(2)]);

        let row = GroupRowManager::create(&group, &rows, &schema(), &NullSink);
        assert_eq!(row.children.len(), 2);
        assert_eq!(row.data["estimated"], CellValue::Number(30.0));
        assert!(!row.data.contains_key("description"));
    }

    #[test]
    fn group_row_reports_and_skips_missing_children() {
        let rows = rows(&[model(1, 10.0)]);
        let group = GroupModel::new(GroupId(7), "Crew", vec![ModelId(1), ModelId(5)]);
        let sink = RecordingSink::new();

        let row = GroupRowManager::create(&group, &rows, &schema(), &sink);
        assert_eq!(row.children, vec![EditableRowId::Model(ModelId(1))]);
        assert_eq!(row.data["estimated"], CellValue::Number(10.0));
        assert_eq!(
            sink.reports(),
            vec![Inconsistency::ChildNotFound {
                parent: RowId::Group(GroupId(7)),
                child: EditableRowId::Model(ModelId(5)),
            }]
        );
    }

    #[test]
    fn percent_markup_amount_and_contribution() {
        let rows = rows(&[model(1, 100.0), model(2, 50.0)]);
        let markup = MarkupModel::percent(MarkupId(3), 0.1, vec![ModelId(1), ModelId(2)]);

        let row = MarkupRowManager::create(&markup, &rows, &schema(), &NullSink);
        assert_eq!(row.data["estimated"], CellValue::Number(15.0));
        assert_eq!(row.data["actual"], CellValue::Null);

        let contribution = MarkupRowManager::contribution(&rows[0], &[&row], &schema());
        assert!((contribution - 10.0).abs() < 1e-9);
    }

    #[test]
    fn flat_markup_amount_is_rate() {
        let markup = MarkupModel::flat(MarkupId(3), 500.0);
        let row = MarkupRowManager::create(&markup, &[], &schema(), &NullSink);
        assert_eq!(row.data["estimated"], CellValue::Number(500.0));
    }
}
