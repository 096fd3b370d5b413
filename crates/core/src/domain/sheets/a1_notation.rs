use std::fmt::Formatter;

use super::cell_position::CellPosition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Notation(pub String);

impl std::fmt::Display for A1Notation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<A1Notation> for String {
    fn from(a1_notation: A1Notation) -> Self {
        a1_notation.0
    }
}

impl AsRef<str> for A1Notation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub trait ToA1Notation {
    fn to_a1_notation(&self, sheet_title: Option<&str>) -> A1Notation;
}

/// Quotes a sheet title for use in a range, doubling any embedded single quote.
pub fn quote_sheet_title(sheet_title: &str) -> String {
    format!("'{}'", sheet_title.replace('\'', "''"))
}

/// A whole sheet, e.g. `'Grades'`.
pub fn whole_sheet(sheet_title: &str) -> A1Notation {
    A1Notation(quote_sheet_title(sheet_title))
}

impl ToA1Notation for CellPosition {
    fn to_a1_notation(&self, sheet_title: Option<&str>) -> A1Notation {
        match sheet_title {
            Some(sheet_title) => {
                A1Notation(format!("{}!{}", quote_sheet_title(sheet_title), self))
            }
            None => A1Notation(self.to_string()),
        }
    }
}

/// A rectangular block between two cells, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSpan {
    pub start: CellPosition,
    pub end: CellPosition,
}

impl CellSpan {
    /// Span covering `len` cells downward from `start`; `len` must be at least 1.
    pub fn column_from(start: CellPosition, len: u32) -> Self {
        CellSpan {
            start,
            end: start.below(len.saturating_sub(1)),
        }
    }
}

impl ToA1Notation for CellSpan {
    fn to_a1_notation(&self, sheet_title: Option<&str>) -> A1Notation {
        let local = format!("{}:{}", self.start, self.end);
        match sheet_title {
            Some(sheet_title) => A1Notation(format!("{}!{}", quote_sheet_title(sheet_title), local)),
            None => A1Notation(local),
        }
    }
}
