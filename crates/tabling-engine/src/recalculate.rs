//! Derived-field recalculation hook
//!
//! Runs after edits are merged into a row; its output is folded back into
//! the row's data.

use tabling_rows::{CellValue, RowData, TableSchema};

/// Computes derived fields of an editable row
pub trait RecalculateRow: Send + Sync {
    /// Derived fields to overwrite, given the row's merged data
    fn recalculate(&self, data: &RowData, schema: &TableSchema) -> RowData;
}

impl<F> RecalculateRow for F
where
    F: Fn(&RowData, &TableSchema) -> RowData + Send + Sync,
{
    fn recalculate(&self, data: &RowData, schema: &TableSchema) -> RowData {
        self(data, schema)
    }
}

/// Budget line arithmetic
///
/// `estimated = quantity * rate * multiplier`, `variance = estimated - actual`.
/// A missing multiplier counts as 1; with no quantity and no rate the
/// estimate is left alone.
#[derive(Debug, Clone)]
pub struct BudgetRecalculation {
    quantity: String,
    rate: String,
    multiplier: String,
    estimated: String,
    actual: String,
    variance: String,
}

impl Default for BudgetRecalculation {
    fn default() -> Self {
        Self {
            quantity: "quantity".to_string(),
            rate: "rate".to_string(),
            multiplier: "multiplier".to_string(),
            estimated: "estimated".to_string(),
            actual: "actual".to_string(),
            variance: "variance".to_string(),
        }
    }
}

impl BudgetRecalculation {
    /// Create with the standard field names
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn number(data: &RowData, field: &str) -> Option<f64> {
        data.get(field).and_then(CellValue::as_f64)
    }
}

impl RecalculateRow for BudgetRecalculation {
    fn recalculate(&self, data: &RowData, schema: &TableSchema) -> RowData {
        let mut out = RowData::new();

        let quantity = Self::number(data, &self.quantity);
        let rate = Self::number(data, &self.rate);
        let estimated = match (quantity, rate) {
            (None, None) => Self::number(data, &self.estimated),
            (q, r) => {
                let multiplier = Self::number(data, &self.multiplier).unwrap_or(1.0);
                Some(q.unwrap_or(0.0) * r.unwrap_or(0.0) * multiplier)
            }
        };

        if let Some(estimated) = estimated {
            if schema.column(&self.estimated).is_some() {
                out.insert(self.estimated.clone(), CellValue::Number(estimated));
            }
            if schema.column(&self.variance).is_some() {
                let actual = Self::number(data, &self.actual).unwrap_or(0.0);
                out.insert(self.variance.clone(), CellValue::Number(estimated - actual));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabling_rows::Column;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::body("quantity", "Qty"),
            Column::body("rate", "Rate"),
            Column::body("multiplier", "X"),
            Column::calculated("estimated", "Estimated"),
            Column::read_only("actual", "Actual"),
            Column::calculated("variance", "Variance"),
        ])
        .unwrap()
    }

    fn data(pairs: &[(&str, f64)]) -> RowData {
        pairs
            .iter()
            .map(|(f, v)| ((*f).to_string(), CellValue::Number(*v)))
            .collect()
    }

    #[test]
    fn estimated_and_variance() {
        let out = BudgetRecalculation::new().recalculate(
            &data(&[("quantity", 2.0), ("rate", 50.0), ("multiplier", 1.5), ("actual", 100.0)]),
            &schema(),
        );
        assert_eq!(out["estimated"], CellValue::Number(150.0));
        assert_eq!(out["variance"], CellValue::Number(50.0));
    }

    #[test]
    fn missing_multiplier_counts_as_one() {
        let out = BudgetRecalculation::new()
            .recalculate(&data(&[("quantity", 3.0), ("rate", 4.0)]), &schema());
        assert_eq!(out["estimated"], CellValue::Number(12.0));
    }

    #[test]
    fn nothing_to_compute_keeps_estimate() {
        let out = BudgetRecalculation::new().recalculate(&data(&[("estimated", 9.0)]), &schema());
        assert_eq!(out["estimated"], CellValue::Number(9.0));
        assert_eq!(out["variance"], CellValue::Number(9.0));
    }

    #[test]
    fn closures_are_hooks() {
        let hook = |_: &RowData, _: &TableSchema| data(&[("estimated", 1.0)]);
        let out = hook.recalculate(&RowData::new(), &schema());
        assert_eq!(out.len(), 1);
    }
}
