use thiserror::Error;

use super::{
    grading::parse_number,
    schema::{GradebookField, GradebookSchema},
};
use crate::domain::sheets::row::Row;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordFieldError {
    #[error("row {row}: '{field}' is empty")]
    Missing { row: u32, field: &'static str },
    #[error("row {row}: '{field}' is not a number: '{value}'")]
    NotNumeric {
        row: u32,
        field: &'static str,
        value: String,
    },
}

/// One data row of a gradebook worksheet, read through the resolved schema.
#[derive(Debug, Clone, Copy)]
pub struct GradebookRecord<'a> {
    pub row: Row,
    cells: &'a [String],
    schema: &'a GradebookSchema,
}

impl<'a> GradebookRecord<'a> {
    pub fn raw(&self, field: GradebookField) -> Option<&'a str> {
        let index = self.schema.column(field).index() as usize;
        self.cells
            .get(index)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn number(&self, field: GradebookField) -> Result<f64, RecordFieldError> {
        let raw = self.raw(field).ok_or(RecordFieldError::Missing {
            row: self.row.number(),
            field: field.header(),
        })?;

        parse_number(raw).ok_or_else(|| RecordFieldError::NotNumeric {
            row: self.row.number(),
            field: field.header(),
            value: raw.to_owned(),
        })
    }
}

/// Every row after the header, in sheet order. The first record lives on sheet row 2.
pub fn records<'a>(
    values: &'a [Vec<String>],
    schema: &'a GradebookSchema,
) -> impl Iterator<Item = GradebookRecord<'a>> + 'a {
    values
        .iter()
        .enumerate()
        .skip(1)
        .map(move |(index, cells)| GradebookRecord {
            row: Row::from_index(index as u32),
            cells,
            schema,
        })
}
