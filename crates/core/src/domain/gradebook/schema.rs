use std::collections::HashMap;

use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};
use thiserror::Error;

use crate::domain::sheets::column::Column;

/// Named columns a gradebook worksheet must carry in its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr, strum::Display)]
pub enum GradebookField {
    #[strum(serialize = "Assignment 1")]
    Assignment1,
    #[strum(serialize = "Quiz 1")]
    Quiz1,
    #[strum(serialize = "Exam 1")]
    Exam1,
    #[strum(serialize = "Final Grade")]
    FinalGrade,
    #[strum(serialize = "Attendance")]
    Attendance,
    #[strum(serialize = "Attendance %")]
    AttendancePercentage,
}

impl GradebookField {
    pub fn header(&self) -> &'static str {
        self.into()
    }

    /// Where the field sits in the standard gradebook layout
    /// (`Student ID | Name | Assignment 1 | Quiz 1 | Exam 1 | Final Grade | Attendance | Attendance %`).
    pub fn canonical_column(&self) -> Column {
        let index = match self {
            GradebookField::Assignment1 => 2,
            GradebookField::Quiz1 => 3,
            GradebookField::Exam1 => 4,
            GradebookField::FinalGrade => 5,
            GradebookField::Attendance => 6,
            GradebookField::AttendancePercentage => 7,
        };
        Column::from_index(index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("worksheet header does not match the gradebook layout, missing columns: {}", .missing.join(", "))]
pub struct SchemaMismatch {
    pub missing: Vec<&'static str>,
}

/// Mapping from gradebook fields to the columns where the live sheet keeps them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradebookSchema {
    columns: HashMap<GradebookField, Column>,
}

impl GradebookSchema {
    /// Locates every field in the header row. Headers match after trimming, ignoring ASCII case;
    /// the first occurrence wins.
    pub fn resolve(header_row: &[String]) -> Result<Self, SchemaMismatch> {
        let mut columns = HashMap::new();
        let mut missing = Vec::new();

        for field in GradebookField::iter() {
            let found = header_row
                .iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case(field.header()));

            match found {
                Some(index) => {
                    let column = Column::from_index(index as u32);
                    if column != field.canonical_column() {
                        tracing::debug!(
                            "{} found in column {} instead of {}",
                            field,
                            column,
                            field.canonical_column()
                        );
                    }
                    columns.insert(field, column);
                }
                None => missing.push(field.header()),
            }
        }

        if !missing.is_empty() {
            return Err(SchemaMismatch { missing });
        }

        Ok(GradebookSchema { columns })
    }

    pub fn canonical() -> Self {
        GradebookSchema {
            columns: GradebookField::iter()
                .map(|field| (field, field.canonical_column()))
                .collect(),
        }
    }

    pub fn column(&self, field: GradebookField) -> Column {
        self.columns
            .get(&field)
            .copied()
            .unwrap_or_else(|| field.canonical_column())
    }
}
