//! Server-side models
//!
//! Shapes of the JSON the REST API returns for list, detail, create and
//! update requests, plus the outbound [`Payload`].

use crate::id::{GroupId, MarkupId, ModelId};
use crate::value::{CellValue, RowData};
use serde::{Deserialize, Serialize};

/// Persisted line item (account, sub-account, actual, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Server id
    pub id: ModelId,
    /// Remaining scalar attributes, keyed by field
    #[serde(flatten)]
    pub attributes: RowData,
}

impl Model {
    /// Create model with no attributes
    #[inline]
    #[must_use]
    pub fn new(id: ModelId) -> Self {
        Self {
            id,
            attributes: RowData::new(),
        }
    }

    /// With attribute
    #[inline]
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Attribute value (`Null` if absent)
    #[must_use]
    pub fn get(&self, field: &str) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.attributes.get(field).unwrap_or(&NULL)
    }
}

/// Persisted group of line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupModel {
    /// Server id
    pub id: GroupId,
    /// Display name
    pub name: String,
    /// Display color
    #[serde(default)]
    pub color: Option<String>,
    /// Member line items
    #[serde(default)]
    pub children: Vec<ModelId>,
}

impl GroupModel {
    /// Create group
    #[inline]
    #[must_use]
    pub fn new(id: GroupId, name: impl Into<String>, children: Vec<ModelId>) -> Self {
        Self {
            id,
            name: name.into(),
            color: None,
            children,
        }
    }
}

/// How a markup rate is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupUnit {
    /// Rate is a fraction of the children's base values
    #[default]
    Percent,
    /// Rate is an absolute amount
    Flat,
}

/// Persisted markup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupModel {
    /// Server id
    pub id: MarkupId,
    /// Short identifier
    #[serde(default)]
    pub identifier: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Percent or flat
    #[serde(default)]
    pub unit: MarkupUnit,
    /// Fraction for percent markups, amount for flat markups
    #[serde(default)]
    pub rate: f64,
    /// Line items the markup applies to
    #[serde(default)]
    pub children: Vec<ModelId>,
}

impl MarkupModel {
    /// Create percent markup
    #[inline]
    #[must_use]
    pub fn percent(id: MarkupId, rate: f64, children: Vec<ModelId>) -> Self {
        Self {
            id,
            identifier: None,
            description: None,
            unit: MarkupUnit::Percent,
            rate,
            children,
        }
    }

    /// Create flat markup
    #[inline]
    #[must_use]
    pub fn flat(id: MarkupId, rate: f64) -> Self {
        Self {
            unit: MarkupUnit::Flat,
            ..Self::percent(id, rate, Vec::new())
        }
    }
}

/// Paginated list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<M> {
    /// Page contents
    pub data: Vec<M>,
    /// Total number of items on the server
    pub count: usize,
}

impl<M> ListResponse<M> {
    /// Response whose count equals its length
    #[must_use]
    pub fn of(data: Vec<M>) -> Self {
        let count = data.len();
        Self { data, count }
    }
}

/// Everything needed to populate a table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableResponse {
    /// Line items
    pub models: Vec<Model>,
    /// Groups over the line items
    #[serde(default)]
    pub groups: Vec<GroupModel>,
    /// Markups over the line items
    #[serde(default)]
    pub markups: Vec<MarkupModel>,
    /// Total number of line items on the server
    pub count: usize,
}

impl From<ListResponse<Model>> for TableResponse {
    fn from(response: ListResponse<Model>) -> Self {
        Self {
            models: response.data,
            groups: Vec::new(),
            markups: Vec::new(),
            count: response.count,
        }
    }
}

/// Outbound create or update body
///
/// Contains only user-editable fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub RowData);

impl Payload {
    /// Check for an empty payload (nothing to send)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field value
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.0.get(field)
    }

    /// JSON body
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(field, value)| (field.clone(), value.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_flattens_attributes() {
        let json = serde_json::json!({"id": 4, "description": "Camera", "rate": 250});
        let model: Model = serde_json::from_value(json).unwrap();

        assert_eq!(model.id, ModelId(4));
        assert_eq!(model.get("description"), &CellValue::from("Camera"));
        assert_eq!(model.get("rate"), &CellValue::Number(250.0));
        assert_eq!(model.get("missing"), &CellValue::Null);
    }

    #[test]
    fn markup_defaults_from_sparse_json() {
        let json = serde_json::json!({"id": 2, "rate": 0.1, "children": [1, 2]});
        let markup: MarkupModel = serde_json::from_value(json).unwrap();

        assert_eq!(markup.unit, MarkupUnit::Percent);
        assert_eq!(markup.children, vec![ModelId(1), ModelId(2)]);
    }

    #[test]
    fn group_parses_server_shape() {
        let json = serde_json::json!({"id": 9, "name": "Crew", "color": "#fff", "children": [3]});
        let group: GroupModel = serde_json::from_value(json).unwrap();
        assert_eq!(group.id, GroupId(9));
        assert_eq!(group.color.as_deref(), Some("#fff"));
    }

    #[test]
    fn list_response_into_table_response() {
        let response = ListResponse::of(vec![Model::new(ModelId(1)), Model::new(ModelId(2))]);
        let table: TableResponse = response.into();
        assert_eq!(table.count, 2);
        assert!(table.groups.is_empty());
    }

    #[test]
    fn payload_serializes_as_plain_object() {
        let mut data = RowData::new();
        data.insert("rate".to_string(), CellValue::Number(2.0));
        let payload = Payload(data);

        assert_eq!(payload.to_json(), serde_json::json!({"rate": 2.0}));
        assert_eq!(serde_json::to_value(&payload).unwrap(), serde_json::json!({"rate": 2.0}));
    }
}
