use google_sheets4::api::ValueRange;
use serde_json::Value;
use std::borrow::Cow;

pub trait ValueRangeFactory {
    fn from_single_cell<'a, T: Into<Cow<'a, str>> + Clone>(cell_value: T) -> Self;
    fn from_single_column<'a, T: Into<Cow<'a, str>> + Clone>(column_values: &[T]) -> Self;
}

fn wrap_value<'a, T: Into<Cow<'a, str>>>(value: T) -> Value {
    Value::String(value.into().into_owned())
}

impl ValueRangeFactory for ValueRange {
    fn from_single_cell<'a, T: Into<Cow<'a, str>> + Clone>(cell_value: T) -> Self {
        ValueRange {
            major_dimension: None,
            range: None,
            values: Some(vec![vec![wrap_value(cell_value)]]),
        }
    }

    fn from_single_column<'a, T: Into<Cow<'a, str>> + Clone>(column_values: &[T]) -> Self {
        let values = column_values
            .iter()
            .map(|col_item| vec![wrap_value(col_item.clone())])
            .collect::<Vec<_>>();

        Self {
            major_dimension: Some("ROWS".to_string()),
            range: None,
            values: Some(values),
        }
    }
}

/// Displayed text of a value returned by `values.get`.
pub fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

pub trait IntoStringGrid {
    fn into_string_grid(self) -> Vec<Vec<String>>;
}

impl IntoStringGrid for ValueRange {
    fn into_string_grid(self) -> Vec<Vec<String>> {
        self.values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_iter().map(value_to_string).collect())
            .collect()
    }
}
