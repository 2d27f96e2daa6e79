//! Loosely structured configuration tables and their pre-normalization pass.

use async_trait::async_trait;
use serde_json::{Map, Value};

/// A raw record as returned by a table source, with column order preserved.
pub type Record = Map<String, Value>;

/// Where configuration tables come from.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Every row of `table`, in source order.
    async fn fetch_all(&self, table: &str) -> anyhow::Result<Vec<Record>>;
}

/// A row set with an explicit, ordered column list.
///
/// Columns are collected in order of first appearance across the records, so
/// a sparse record never reorders the table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn from_records(name: &str, records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|column| record.remove(column).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self {
            name: name.to_string(),
            columns,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-folds and trims every column name and trims every string cell.
    ///
    /// Applying it twice yields the same table.
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.clone(),
            columns: self.columns.iter().map(|c| normalize_name(c)).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(normalize_cell).collect())
                .collect(),
        }
    }

    /// Textual value of a cell, empty for nulls and missing cells.
    pub fn cell_text(&self, row: usize, column: usize) -> String {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(value_text)
            .unwrap_or_default()
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Key used for identity comparisons of user facing labels (country names,
/// account codes): trimmed and case-folded.
pub fn identity_key(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalize_cell(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_records_keeps_first_appearance_order() {
        let table = Table::from_records(
            "countries",
            vec![
                record(json!({"Paese": "Italia", "Valuta": "EUR"})),
                record(json!({"Paese": "Svizzera", "Note": "x", "Valuta": "CHF"})),
            ],
        );

        assert_eq!(table.columns, vec!["Paese", "Valuta", "Note"]);
        assert_eq!(table.rows[0][2], Value::Null);
        assert_eq!(table.cell_text(1, 1), "CHF");
        assert_eq!(table.cell_text(1, 2), "x");
    }

    #[test]
    fn test_normalized_folds_columns_and_trims_cells() {
        let table = Table::from_records(
            "countries",
            vec![record(json!({" Currency Symbol ": "  USD ", "Rank": 3}))],
        );

        let normalized = table.normalized();
        assert_eq!(normalized.columns, vec!["currency symbol", "rank"]);
        assert_eq!(normalized.rows[0][0], json!("USD"));
        assert_eq!(normalized.rows[0][1], json!(3));
        assert_eq!(normalized.normalized(), normalized);
    }

    #[test]
    fn test_cell_text_for_non_strings() {
        let table = Table::from_records("accounts", vec![record(json!({"code": 4010, "x": null}))]);

        assert_eq!(table.cell_text(0, 0), "4010");
        assert_eq!(table.cell_text(0, 1), "");
        assert_eq!(table.cell_text(5, 0), "");
    }
}
