//! CSV export of a table's rows
//!
//! Header row holds the column labels. Group rows are labelled with the
//! group name in the first column and carry their aggregates; markup rows
//! are labelled with their identifier (or description) and carry the
//! markup amount.

use std::fmt::Write;
use tabling_rows::{Row, TableSchema};

/// Render rows as CSV (CRLF-free, `\n` line endings)
#[must_use]
pub fn to_csv(rows: &[Row], schema: &TableSchema) -> String {
    let mut out = String::new();
    let columns = schema.columns();

    push_record(&mut out, columns.iter().map(|c| c.label.clone()));

    for row in rows {
        let cells: Vec<String> = match row {
            Row::Model(_) | Row::Placeholder(_) => {
                columns.iter().map(|c| row.get(&c.field).to_string()).collect()
            }
            Row::Group(group) => columns
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if i == 0 {
                        group.name.clone()
                    } else {
                        group.data.get(&c.field).map(ToString::to_string).unwrap_or_default()
                    }
                })
                .collect(),
            Row::Markup(markup) => {
                let label = markup
                    .identifier
                    .clone()
                    .or_else(|| markup.description.clone())
                    .unwrap_or_default();
                let amount = &schema.markup_fields().amount;
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        if i == 0 {
                            label.clone()
                        } else if c.field == *amount {
                            markup.data.get(amount).map(ToString::to_string).unwrap_or_default()
                        } else {
                            String::new()
                        }
                    })
                    .collect()
            }
        };
        push_record(&mut out, cells);
    }

    out
}

fn push_record(out: &mut String, cells: impl IntoIterator<Item = String>) {
    for (i, cell) in cells.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n', '\r']) {
            let _ = write!(out, "\"{}\"", cell.replace('"', "\"\""));
        } else {
            out.push_str(&cell);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::TableReducer;
    use tabling_rows::{
        Column, GroupId, GroupModel, MarkupId, MarkupModel, Model, ModelId, TableResponse,
    };

    #[test]
    fn csv_labels_aggregates_and_quotes() {
        let schema = TableSchema::new(vec![
            Column::body("description", "Description"),
            Column::calculated("estimated", "Estimated").summed(),
        ])
        .unwrap();
        let reducer = TableReducer::new(schema.clone());
        let mut markup = MarkupModel::percent(MarkupId(1), 0.1, vec![ModelId(1)]);
        markup.identifier = Some("Fee".to_string());
        let rows = reducer.populate(&TableResponse {
            models: vec![
                Model::new(ModelId(1))
                    .with("description", "Camera, body")
                    .with("estimated", 100.0),
                Model::new(ModelId(2)).with("description", "6\" rail"),
            ],
            groups: vec![GroupModel::new(GroupId(1), "Gear", vec![ModelId(1)])],
            markups: vec![markup],
            count: 2,
        });

        let csv = to_csv(&rows, &schema);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Description,Estimated",
                "Gear,100",
                "\"Camera, body\",100",
                "\"6\"\" rail\",",
                "Fee,10",
            ]
        );
    }
}
