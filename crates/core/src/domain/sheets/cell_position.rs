use super::{column::Column, row::Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPosition {
    pub row: Row,
    pub col: Column,
}

impl CellPosition {
    pub fn new(row: Row, col: Column) -> Self {
        CellPosition { row, col }
    }

    /// Position of the value at `values[row_index][col_index]` of a `get_all_values` grid.
    pub fn from_indices(row_index: usize, col_index: usize) -> Self {
        CellPosition {
            row: Row::from_index(row_index as u32),
            col: Column::from_index(col_index as u32),
        }
    }

    pub fn below(self, rows: u32) -> Self {
        CellPosition {
            row: self.row.offset(rows),
            ..self
        }
    }
}

impl std::fmt::Display for CellPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.col, self.row)
    }
}
